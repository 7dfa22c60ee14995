//! The game's byte-oriented LZ codec.
//!
//! A stream is a run of commands closed by `0xFF`. Each command starts with
//! either a one-byte header `CCCLLLLL` (length 1..=32) or a two-byte header
//! `111CCCLL LLLLLLLL` (length 1..=1024):
//!
//! - 0 copy `n` literal bytes
//! - 1 fill `n` bytes with one byte
//! - 2 fill `n` bytes alternating two bytes
//! - 3 fill `n` bytes counting up from one byte
//! - 4 repeat `n` bytes from an absolute output position (16-bit LE)
//! - 5 same as 4 with every byte inverted
//! - 6 repeat `n` bytes from a backward distance (8-bit)
//!
//! Track maps are stored compressed twice; callers run the codec twice
//! themselves.

mod compress;
mod decompress;

pub use compress::compress;
pub use decompress::{compressed_chunk, compressed_len, decompress, decompress_at};

pub(crate) const END_OF_STREAM: u8 = 0xFF;
pub(crate) const SHORT_MAX_LEN: usize = 32;
pub(crate) const LONG_MAX_LEN: usize = 1024;
/// Furthest output position an absolute repeat can name.
pub(crate) const MAX_ABSOLUTE_SOURCE: usize = 0xFFFF;
pub(crate) const MAX_RELATIVE_DISTANCE: usize = 0xFF;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Command {
    Copy = 0,
    ByteFill = 1,
    WordFill = 2,
    IncreasingFill = 3,
    Repeat = 4,
    RepeatInverted = 5,
    RepeatRelative = 6,
}

impl Command {
    pub(crate) fn from_code(code: u8) -> Option<Command> {
        match code {
            0 => Some(Command::Copy),
            1 => Some(Command::ByteFill),
            2 => Some(Command::WordFill),
            3 => Some(Command::IncreasingFill),
            4 => Some(Command::Repeat),
            5 => Some(Command::RepeatInverted),
            6 => Some(Command::RepeatRelative),
            _ => None,
        }
    }

    /// Operand bytes following the header, for every command but `Copy`.
    pub(crate) fn operand_len(self, length: usize) -> usize {
        match self {
            Command::Copy => length,
            Command::ByteFill | Command::IncreasingFill | Command::RepeatRelative => 1,
            Command::WordFill | Command::Repeat | Command::RepeatInverted => 2,
        }
    }
}

pub(crate) fn header_len(length: usize) -> usize {
    if length <= SHORT_MAX_LEN {
        1
    } else {
        2
    }
}

pub(crate) fn write_header(out: &mut Vec<u8>, command: Command, length: usize) {
    debug_assert!((1..=LONG_MAX_LEN).contains(&length));
    let code = command as u8;
    let l = length - 1;
    if length <= SHORT_MAX_LEN {
        out.push((code << 5) | l as u8);
    } else {
        out.push(0xE0 | (code << 2) | (l >> 8) as u8);
        out.push((l & 0xFF) as u8);
    }
}

/// Encoder settings. `quirks_mode` is set for the Japanese and European
/// releases, whose decompressor cannot take long relative repeats.
/// `optimal` trades speed for the smallest encoding.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CodecOptions {
    pub quirks_mode: bool,
    pub optimal: bool,
}

impl CodecOptions {
    pub fn new(quirks_mode: bool, optimal: bool) -> Self {
        CodecOptions { quirks_mode, optimal }
    }
}
