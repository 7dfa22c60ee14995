use log::{debug, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::loader::{is_candidate, load_rom_file};
use crate::offsets::GameRegion;
use crate::RomImage;

/// What the scanner made of one file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    Rom { region: GameRegion, header_len: usize, size: usize },
    Rejected { reason: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub outcome: ScanOutcome,
}

impl ScanEntry {
    pub fn is_rom(&self) -> bool {
        matches!(self.outcome, ScanOutcome::Rom { .. })
    }
}

/// Classifies a single file.
pub fn classify_file(path: &Path) -> ScanOutcome {
    let result = load_rom_file(path).and_then(RomImage::from_bytes);
    match result {
        Ok(rom) => ScanOutcome::Rom {
            region: rom.region(),
            header_len: rom.header().len(),
            size: rom.len(),
        },
        Err(e) => ScanOutcome::Rejected {
            reason: e.to_string(),
        },
    }
}

/// Walks `dir` and classifies every file with a ROM or archive extension.
/// Entries come back sorted by path.
pub fn scan_roms(dir: &Path) -> Vec<ScanEntry> {
    let mut entries = Vec::new();
    for item in WalkDir::new(dir).sort_by_file_name() {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                entries.push(ScanEntry {
                    path,
                    outcome: ScanOutcome::Rejected {
                        reason: e.to_string(),
                    },
                });
                continue;
            }
        };
        if !item.file_type().is_file() || !is_candidate(item.path()) {
            continue;
        }
        debug!("classifying {}", item.path().display());
        entries.push(ScanEntry {
            path: item.path().to_path_buf(),
            outcome: classify_file(item.path()),
        });
    }
    entries
}
