use flate2::read::GzDecoder;
use log::debug;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use zip::ZipArchive;

use crate::{KartError, Result};

/// Extensions a ROM dump is commonly stored under.
pub const ROM_EXTENSIONS: [&str; 5] = ["bin", "fig", "sfc", "smc", "swc"];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Container {
    Raw,
    Zip,
    Gzip,
}

impl Container {
    pub fn detect(path: &Path) -> Self {
        match extension_of(path).as_deref() {
            Some("zip") => Container::Zip,
            Some("gz") => Container::Gzip,
            _ => Container::Raw,
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether `name` looks like a ROM dump.
pub fn has_rom_extension(name: &str) -> bool {
    extension_of(Path::new(name)).map_or(false, |ext| ROM_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether the scanner should look at `path`: a dump or an archive.
pub fn is_candidate(path: &Path) -> bool {
    match extension_of(path).as_deref() {
        Some("zip") | Some("gz") => true,
        Some(ext) => ROM_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// Reads the ROM bytes at `path`, unpacking zip and gzip containers.
pub fn load_rom_file(path: &Path) -> Result<Vec<u8>> {
    let container = Container::detect(path);
    debug!("reading {} as {:?}", path.display(), container);
    match container {
        Container::Raw => Ok(fs::read(path)?),
        Container::Zip => read_zip(path),
        Container::Gzip => read_gzip(path),
    }
}

/// The first plain entry with a ROM extension.
fn read_zip(path: &Path) -> Result<Vec<u8>> {
    let reader = BufReader::new(File::open(path)?);
    let mut archive = ZipArchive::new(reader).map_err(|e| KartError::Archive(e.to_string()))?;

    for i in 0..archive.len() {
        // Entries that cannot be opened (encrypted, unsupported method) are skipped.
        let Ok(mut entry) = archive.by_index(i) else {
            continue;
        };
        if entry.is_dir() || !has_rom_extension(entry.name()) {
            continue;
        }
        debug!("using archive entry {}", entry.name());
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| KartError::Archive(e.to_string()))?;
        return Ok(data);
    }

    Err(KartError::Archive(format!(
        "no ROM file found in {}",
        path.display()
    )))
}

fn read_gzip(path: &Path) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    let mut data = Vec::new();
    decoder
        .read_to_end(&mut data)
        .map_err(|e| KartError::Archive(e.to_string()))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: Vec<(&str, Vec<u8>)>) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(name, FileOptions::default()).unwrap();
            } else {
                zip.start_file(name, FileOptions::default()).unwrap();
                zip.write_all(&data).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn detects_containers_by_extension() {
        assert_eq!(Container::detect(Path::new("kart.ZIP")), Container::Zip);
        assert_eq!(Container::detect(Path::new("kart.sfc.gz")), Container::Gzip);
        assert_eq!(Container::detect(Path::new("kart.smc")), Container::Raw);
        assert_eq!(Container::detect(Path::new("kart")), Container::Raw);
    }

    #[test]
    fn recognises_rom_names() {
        assert!(has_rom_extension("Super Mario Kart (USA).SFC"));
        assert!(has_rom_extension("dir/kart.swc"));
        assert!(!has_rom_extension("readme.txt"));
        assert!(!has_rom_extension("smc"));
        assert!(is_candidate(Path::new("a/b.zip")));
        assert!(!is_candidate(Path::new("a/b.txt")));
    }

    #[test]
    fn reads_raw_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kart.smc");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        assert_eq!(load_rom_file(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn picks_first_rom_entry_from_zip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kart.zip");
        write_zip(
            &path,
            vec![
                ("roms/", Vec::new()),
                ("readme.txt", b"hello".to_vec()),
                ("roms/kart.sfc", vec![9, 8, 7]),
                ("other.smc", vec![1]),
            ],
        );
        assert_eq!(load_rom_file(&path).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn zip_without_rom_is_an_archive_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.zip");
        write_zip(&path, vec![("notes.txt", b"nothing here".to_vec())]);
        assert!(matches!(load_rom_file(&path), Err(KartError::Archive(_))));
    }

    #[test]
    fn corrupt_zip_is_an_archive_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        fs::write(&path, b"not a zip at all").unwrap();
        assert!(matches!(load_rom_file(&path), Err(KartError::Archive(_))));
    }

    #[test]
    fn reads_gzip_streams() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kart.sfc.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[0x42; 1000]).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();
        assert_eq!(load_rom_file(&path).unwrap(), vec![0x42; 1000]);
    }

    #[test]
    fn missing_file_is_io() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_rom_file(&dir.path().join("nope.sfc")),
            Err(KartError::Io(_))
        ));
    }
}
