use thiserror::Error;

pub mod address;
pub mod checksum;
pub mod codec;
pub mod loader;
pub mod offsets;
pub mod rom;
pub mod save_buffer;
pub mod scan;
pub mod settings;
pub mod tracks;

#[cfg(test)]
pub(crate) mod test_rom;

pub use address::{Address, Span};
pub use codec::CodecOptions;
pub use offsets::{GameRegion, OffsetName, OffsetTable};
pub use rom::{RomImage, RomValidity};
pub use save_buffer::SaveBuffer;
pub use settings::EditorSettings;

pub const KIB: usize = 1024;

#[derive(Debug, Error)]
pub enum KartError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid ROM header size: {0} bytes (expected 0 or 512)")]
    InvalidHeaderSize(usize),

    #[error("invalid ROM size: {0} bytes")]
    InvalidRomSize(usize),

    #[error("not a Super Mario Kart ROM (unexpected cartridge signature)")]
    WrongGame,

    #[error("invalid region value 0x{value:02X} at file offset 0x{offset:X}")]
    InvalidRegion { offset: usize, value: u8 },

    #[error("invalid compressed data at 0x{offset:X}: {reason}")]
    Decompress { offset: usize, reason: &'static str },

    #[error("address 0x{0:X} is out of range")]
    AddressOutOfRange(u32),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("cannot fit more data in this ROM ({needed} bytes needed, {available} available)")]
    Capacity { needed: usize, available: usize },


    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, KartError>;
