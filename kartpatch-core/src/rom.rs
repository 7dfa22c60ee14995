use log::{debug, info};
use std::fs;
use std::path::Path;

use crate::offsets::{GameRegion, OffsetTable};
use crate::{checksum, loader, KartError, Result, KIB};

/// Copier header some dumps carry in front of the ROM proper.
pub const COPIER_HEADER_LEN: usize = 512;
/// ROM sizes are whole multiples of this unit.
pub const ROM_SIZE_UNIT: usize = 256 * KIB;
pub const MIN_ROM_SIZE: usize = 256 * KIB;
pub const MAX_ROM_SIZE: usize = 8192 * KIB;

// Cartridge header fields (HiROM), relative to the unheadered image.
pub const ROM_TYPE_LOCATION: usize = 0xFFD5;
pub const CART_TYPE_LOCATION: usize = 0xFFD6;
pub const ROM_SIZE_LOCATION: usize = 0xFFD7;
pub const RAM_SIZE_LOCATION: usize = 0xFFD8;
pub const REGION_LOCATION: usize = 0xFFD9;
pub const CHECKSUM_COMPLEMENT_LOCATION: usize = 0xFFDC;
pub const CHECKSUM_LOCATION: usize = 0xFFDE;

/// HiROM + FastROM.
const EXPECTED_ROM_TYPE: u8 = 0x31;
/// ROM + DSP-1 + RAM + battery.
const EXPECTED_CART_TYPE: u8 = 0x05;
/// 2KiB of cartridge RAM.
const EXPECTED_RAM_SIZE: u8 = 0x01;

/// Outcome of checking a raw file before it is accepted as a ROM.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RomValidity {
    Valid { header_len: usize },
    InvalidHeaderSize(usize),
    InvalidSize(usize),
    WrongGame,
}

impl RomValidity {
    pub fn check(file: &[u8]) -> Self {
        let header_len = file.len() % ROM_SIZE_UNIT;
        if header_len != 0 && header_len != COPIER_HEADER_LEN {
            return RomValidity::InvalidHeaderSize(header_len);
        }

        let rom = &file[header_len..];
        if rom.len() < MIN_ROM_SIZE || rom.len() > MAX_ROM_SIZE {
            return RomValidity::InvalidSize(rom.len());
        }

        if rom[ROM_TYPE_LOCATION] != EXPECTED_ROM_TYPE
            || rom[CART_TYPE_LOCATION] != EXPECTED_CART_TYPE
            || rom[RAM_SIZE_LOCATION] != EXPECTED_RAM_SIZE
        {
            return RomValidity::WrongGame;
        }

        RomValidity::Valid { header_len }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, RomValidity::Valid { .. })
    }

    /// The copier header length, or the matching error.
    pub fn into_result(self) -> Result<usize> {
        match self {
            RomValidity::Valid { header_len } => Ok(header_len),
            RomValidity::InvalidHeaderSize(len) => Err(KartError::InvalidHeaderSize(len)),
            RomValidity::InvalidSize(len) => Err(KartError::InvalidRomSize(len)),
            RomValidity::WrongGame => Err(KartError::WrongGame),
        }
    }
}

/// A loaded ROM: the optional copier header, the working image, and what
/// was derived from it at load time.
#[derive(Clone, Debug)]
pub struct RomImage {
    header: Vec<u8>,
    data: Vec<u8>,
    region: GameRegion,
    offsets: OffsetTable,
}

impl RomImage {
    pub fn from_bytes(mut file: Vec<u8>) -> Result<Self> {
        let header_len = RomValidity::check(&file).into_result()?;
        let data = file.split_off(header_len);
        let header = file;

        let value = data[REGION_LOCATION];
        let region = GameRegion::from_byte(value).ok_or(KartError::InvalidRegion {
            offset: header_len + REGION_LOCATION,
            value,
        })?;

        let offsets = OffsetTable::load(region, &data)?;
        info!(
            "loaded {} ROM: {} KiB, {} byte header",
            region,
            data.len() / KIB,
            header_len
        );

        Ok(RomImage {
            header,
            data,
            region,
            offsets,
        })
    }

    /// Reads a ROM file (raw, headered, zip or gzip).
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = loader::load_rom_file(path)?;
        RomImage::from_bytes(bytes)
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Exclusive access to the working image for a save pass.
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub fn region(&self) -> GameRegion {
        self.region
    }

    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn update_checksum(&mut self) {
        checksum::update(&mut self.data);
    }

    /// Header followed by the working image.
    pub fn to_file_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header.len() + self.data.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = self.to_file_bytes();
        debug!("writing {} bytes to {}", bytes.len(), path.display());
        fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_rom::synthetic_rom;

    #[test]
    fn accepts_headered_rom() {
        let mut file = vec![0u8; COPIER_HEADER_LEN];
        file.extend(synthetic_rom(GameRegion::Us, 512 * KIB).0);
        assert_eq!(file.len(), 512 * KIB + 512);
        assert_eq!(RomValidity::check(&file), RomValidity::Valid { header_len: 512 });

        let rom = RomImage::from_bytes(file).unwrap();
        assert_eq!(rom.header().len(), 512);
        assert_eq!(rom.len(), 512 * KIB);
        assert_eq!(rom.region(), GameRegion::Us);
    }

    #[test]
    fn rejects_odd_remainder() {
        let file = vec![0u8; 513 * KIB];
        assert_eq!(RomValidity::check(&file), RomValidity::InvalidHeaderSize(KIB));
        assert!(matches!(
            RomImage::from_bytes(file),
            Err(KartError::InvalidHeaderSize(1024))
        ));
    }

    #[test]
    fn rejects_out_of_range_sizes() {
        assert_eq!(RomValidity::check(&[]), RomValidity::InvalidSize(0));
        assert_eq!(
            RomValidity::check(&vec![0u8; 512]),
            RomValidity::InvalidSize(0)
        );
        let huge = vec![0u8; MAX_ROM_SIZE + ROM_SIZE_UNIT];
        assert_eq!(RomValidity::check(&huge), RomValidity::InvalidSize(huge.len()));
    }

    #[test]
    fn rejects_other_games() {
        let (mut rom, _) = synthetic_rom(GameRegion::Us, 512 * KIB);
        rom[CART_TYPE_LOCATION] = 0x02;
        assert_eq!(RomValidity::check(&rom), RomValidity::WrongGame);
        assert!(!RomValidity::check(&rom).is_valid());
    }

    #[test]
    fn bad_region_reports_file_offset() {
        let mut file = vec![0u8; COPIER_HEADER_LEN];
        let (mut rom, _) = synthetic_rom(GameRegion::Us, 512 * KIB);
        rom[REGION_LOCATION] = 7;
        file.extend(rom);

        let err = RomImage::from_bytes(file).unwrap_err();
        assert!(matches!(
            err,
            KartError::InvalidRegion { offset: 0x101D9, value: 7 }
        ));
        assert_eq!(
            err.to_string(),
            "invalid region value 0x07 at file offset 0x101D9"
        );
    }

    #[test]
    fn file_bytes_put_header_back() {
        let mut file = vec![0xAAu8; COPIER_HEADER_LEN];
        file.extend(synthetic_rom(GameRegion::Japan, 256 * KIB).0);
        let rom = RomImage::from_bytes(file.clone()).unwrap();
        assert_eq!(rom.to_file_bytes(), file);
    }
}
