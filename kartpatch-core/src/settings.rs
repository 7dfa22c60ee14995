use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{KartError, Result};

/// Persistent editor preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Spend more time compressing for smaller output.
    pub optimal_compression: bool,
    /// Keep `<output>.bak` when an existing file is overwritten.
    pub keep_backup: bool,
    pub last_rom_path: Option<PathBuf>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            optimal_compression: true,
            keep_backup: false,
            last_rom_path: None,
        }
    }
}

impl EditorSettings {
    /// `<config dir>/KartPatch/settings.json`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        let mut base = dirs::config_dir().or_else(dirs::data_dir)?;
        base.push("KartPatch");
        base.push("settings.json");
        Some(base)
    }

    /// Reads settings from `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data)
            .map_err(|e| KartError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| KartError::Config(e.to_string()))?;
        fs::write(path, data)?;
        Ok(())
    }
}
