use clap::{Parser, Subcommand};
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use kartpatch_core::codec::{compress, decompress, decompress_at};
use kartpatch_core::scan::{classify_file, scan_roms, ScanEntry, ScanOutcome};
use kartpatch_core::{checksum, CodecOptions, EditorSettings, KartError, Result, RomImage};

#[derive(Debug, Parser)]
#[command(name = "kartpatch", version, about = "Super Mario Kart ROM patching tool")]
struct Args {
    /// Log progress (RUST_LOG takes precedence).
    #[arg(long, global = true)]
    verbose: bool,

    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show region, size, checksum status and resolved offsets.
    Info {
        rom: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Classify files; directories are scanned recursively.
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Decompress a stream starting at a file offset.
    Decompress {
        file: PathBuf,
        #[arg(long, value_parser = parse_offset)]
        offset: usize,
        /// The data is compressed twice (track maps).
        #[arg(long)]
        twice: bool,
        #[arg(long)]
        output: PathBuf,
    },
    /// Compress a whole file.
    Compress {
        file: PathBuf,
        #[arg(long)]
        twice: bool,
        /// Encode for the Japanese and European decompressors.
        #[arg(long)]
        quirks: bool,
        /// Greedy encoding even when optimal compression is configured.
        #[arg(long)]
        fast: bool,
        #[arg(long)]
        output: PathBuf,
    },
    /// Replace one track map and save the ROM.
    ImportTrack {
        rom: PathBuf,
        #[arg(long)]
        track: usize,
        /// Raw 128x128 tile map.
        #[arg(long)]
        map: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Recompute the header checksum.
    FixChecksum {
        rom: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

/// Accepts `0x1F000`, `$1F000` or plain decimal.
fn parse_offset(text: &str) -> std::result::Result<usize, String> {
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16)
    } else if let Some(hex) = text.strip_prefix('$') {
        usize::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|e| format!("invalid offset '{text}': {e}"))
}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn settings_path(args: &Args) -> Option<PathBuf> {
    args.config.clone().or_else(EditorSettings::default_path)
}

fn load_settings(path: Option<&Path>) -> Result<EditorSettings> {
    match path {
        Some(path) => EditorSettings::load(path),
        None => Ok(EditorSettings::default()),
    }
}

fn remember_rom(settings: &mut EditorSettings, path: Option<&Path>, rom: &Path) {
    let Some(path) = path else {
        return;
    };
    settings.last_rom_path = Some(rom.to_path_buf());
    if let Err(e) = settings.save(path) {
        warn!("could not save settings to {}: {}", path.display(), e);
    }
}

/// Writes `bytes` to `output`, first keeping `<output>.bak` when asked to.
fn write_output(settings: &EditorSettings, output: &Path, bytes: &[u8]) -> Result<()> {
    if settings.keep_backup && output.exists() {
        let mut backup = output.as_os_str().to_owned();
        backup.push(".bak");
        fs::copy(output, &backup)?;
        info!("kept backup {}", Path::new(&backup).display());
    }
    fs::write(output, bytes)?;
    info!("wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

fn print_entry(entry: &ScanEntry) {
    match &entry.outcome {
        ScanOutcome::Rom {
            region,
            header_len,
            size,
        } => println!(
            "{}: {} ROM, {} KiB, {} byte header",
            entry.path.display(),
            region,
            size / 1024,
            header_len
        ),
        ScanOutcome::Rejected { reason } => println!("{}: {}", entry.path.display(), reason),
    }
}

fn info(rom_path: &Path, json: bool) -> Result<()> {
    let rom = RomImage::load(rom_path)?;
    let stored = checksum::stored(rom.data());
    let valid = checksum::verify(rom.data());

    if json {
        let report = serde_json::json!({
            "path": rom_path.display().to_string(),
            "region": rom.region(),
            "header_len": rom.header().len(),
            "size": rom.len(),
            "checksum": stored.map(|(sum, _)| format!("0x{sum:04X}")),
            "checksum_valid": valid,
            "offsets": rom.offsets(),
        });
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| KartError::Config(e.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    println!("Region:      {}", rom.region());
    println!("Header:      {} bytes", rom.header().len());
    println!("Size:        {} KiB", rom.len() / 1024);
    if let Some((sum, complement)) = stored {
        let status = if valid { "ok" } else { "MISMATCH" };
        println!("Checksum:    0x{sum:04X} / 0x{complement:04X} ({status})");
    }
    println!("Offsets:");
    for (name, address) in rom.offsets().to_map() {
        println!("  {:<28}{}", format!("{name:?}"), address);
    }
    Ok(())
}

fn check(paths: &[PathBuf]) -> bool {
    let mut all_valid = true;
    for path in paths {
        let entries = if path.is_dir() {
            scan_roms(path)
        } else {
            vec![ScanEntry {
                path: path.clone(),
                outcome: classify_file(path),
            }]
        };
        for entry in &entries {
            all_valid &= entry.is_rom();
            print_entry(entry);
        }
    }
    all_valid
}

fn run(args: Args) -> Result<bool> {
    let config_path = settings_path(&args);
    let mut settings = load_settings(config_path.as_deref())?;

    match args.command {
        Command::Info { rom, json } => info(&rom, json)?,
        Command::Check { paths } => return Ok(check(&paths)),
        Command::Decompress {
            file,
            offset,
            twice,
            output,
        } => {
            let data = fs::read(&file)?;
            let mut out = decompress_at(&data, offset)?;
            if twice {
                out = decompress(&out)?;
            }
            write_output(&settings, &output, &out)?;
        }
        Command::Compress {
            file,
            twice,
            quirks,
            fast,
            output,
        } => {
            let data = fs::read(&file)?;
            let options = CodecOptions::new(quirks, settings.optimal_compression && !fast);
            let mut out = compress(&data, options);
            if twice {
                out = compress(&out, options);
            }
            info!("{} bytes -> {} bytes", data.len(), out.len());
            write_output(&settings, &output, &out)?;
        }
        Command::ImportTrack {
            rom: rom_path,
            track,
            map,
            output,
        } => {
            let mut rom = RomImage::load(&rom_path)?;
            let edits = BTreeMap::from([(track, fs::read(&map)?)]);
            rom.save_track_maps(&edits, settings.optimal_compression)?;
            write_output(&settings, &output, &rom.to_file_bytes())?;
            remember_rom(&mut settings, config_path.as_deref(), &output);
        }
        Command::FixChecksum {
            rom: rom_path,
            output,
        } => {
            let mut rom = RomImage::load(&rom_path)?;
            rom.update_checksum();
            write_output(&settings, &output, &rom.to_file_bytes())?;
            remember_rom(&mut settings, config_path.as_deref(), &output);
        }
    }
    Ok(true)
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn offsets_accept_hex_and_decimal() {
        assert_eq!(parse_offset("0x1F000"), Ok(0x1F000));
        assert_eq!(parse_offset("$C0"), Ok(0xC0));
        assert_eq!(parse_offset("4096"), Ok(4096));
        assert!(parse_offset("0xZZ").is_err());
    }

    #[test]
    fn subcommands_parse() {
        let args = Args::try_parse_from([
            "kartpatch",
            "--verbose",
            "decompress",
            "kart.sfc",
            "--offset",
            "0x30100",
            "--twice",
            "--output",
            "map.bin",
        ])
        .unwrap();
        assert!(args.verbose);
        assert!(matches!(
            args.command,
            Command::Decompress { offset: 0x30100, twice: true, .. }
        ));

        let args = Args::try_parse_from([
            "kartpatch",
            "import-track",
            "kart.sfc",
            "--track",
            "3",
            "--map",
            "map.bin",
            "--output",
            "out.sfc",
            "--config",
            "settings.json",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("settings.json")));
        assert!(matches!(args.command, Command::ImportTrack { track: 3, .. }));
    }
}
