use std::fmt;

use crate::{KartError, Result};

/// Highest value a ROM address can hold (20 bits).
pub const MAX_ADDRESS: u32 = 0xF_FFFF;

/// Bank marker OR'd into the third byte of every stored address.
const BANK_MARKER: u8 = 0xC0;

/// A 20-bit location inside the ROM, stored on disk as three bytes:
/// low byte, middle byte, then `0xC0 | bank nibble`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Address(u32);

impl Address {
    pub fn new(value: u32) -> Result<Self> {
        if value > MAX_ADDRESS {
            return Err(KartError::AddressOutOfRange(value));
        }
        Ok(Address(value))
    }

    pub fn from_usize(value: usize) -> Result<Self> {
        let value = u32::try_from(value).map_err(|_| KartError::AddressOutOfRange(u32::MAX))?;
        Address::new(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Decodes a stored address. The high nibble of the third byte (the bank
    /// marker) is ignored.
    pub fn decode(bytes: [u8; 3]) -> Self {
        let value = ((bytes[2] as u32 & 0x0F) << 16) | ((bytes[1] as u32) << 8) | bytes[0] as u32;
        Address(value)
    }

    pub fn encode(self) -> [u8; 3] {
        [
            (self.0 & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            BANK_MARKER | ((self.0 & 0xF_0000) >> 16) as u8,
        ]
    }

    /// Reads the address stored at `location`.
    pub fn read(rom: &[u8], location: usize) -> Result<Self> {
        let bytes = rom
            .get(location..location + 3)
            .ok_or(KartError::AddressOutOfRange(location as u32))?;
        Ok(Address::decode([bytes[0], bytes[1], bytes[2]]))
    }

    /// Stores this address at `location`.
    pub fn write(self, rom: &mut [u8], location: usize) -> Result<()> {
        let slot = rom
            .get_mut(location..location + 3)
            .ok_or(KartError::AddressOutOfRange(location as u32))?;
        slot.copy_from_slice(&self.encode());
        Ok(())
    }

    /// The 64KiB bank this address lives in.
    pub fn bank(self) -> u32 {
        self.0 & 0xF_0000
    }
}

impl TryFrom<u32> for Address {
    type Error = KartError;

    fn try_from(value: u32) -> Result<Self> {
        Address::new(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:05X}", self.0)
    }
}

/// Half-open interval `[start, end)` over ROM positions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn includes(&self, value: usize) -> bool {
        value >= self.start && value < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_bank_marker() {
        let addr = Address::new(0x8_1234).unwrap();
        assert_eq!(addr.encode(), [0x34, 0x12, 0xC8]);
    }

    #[test]
    fn decode_ignores_marker_nibble() {
        assert_eq!(Address::decode([0x00, 0x00, 0xC5]).value(), 0x5_0000);
        assert_eq!(Address::decode([0xCD, 0xAB, 0x0F]).value(), 0xF_ABCD);
    }

    #[test]
    fn round_trips_every_bank_edge() {
        for bank in 0..=0xFu32 {
            for low in [0u32, 1, 0x7FFF, 0x8000, 0xFFFF] {
                let value = (bank << 16) | low;
                let addr = Address::new(value).unwrap();
                assert_eq!(Address::decode(addr.encode()), addr);
            }
        }
    }

    #[test]
    fn rejects_values_past_20_bits() {
        assert!(Address::new(MAX_ADDRESS).is_ok());
        assert!(matches!(
            Address::new(0x10_0000),
            Err(KartError::AddressOutOfRange(0x10_0000))
        ));
    }

    #[test]
    fn reads_and_writes_in_place() {
        let mut rom = vec![0u8; 16];
        Address::new(0x9_0010).unwrap().write(&mut rom, 4).unwrap();
        assert_eq!(&rom[4..7], &[0x10, 0x00, 0xC9]);
        assert_eq!(Address::read(&rom, 4).unwrap().value(), 0x9_0010);
        assert!(Address::read(&rom, 14).is_err());
    }

    #[test]
    fn span_is_half_open() {
        let span = Span::new(0x80000, 0x100000);
        assert!(span.includes(0x80000));
        assert!(span.includes(0xFFFFF));
        assert!(!span.includes(0x100000));
        assert!(!span.includes(0x7FFFF));
        assert_eq!(span.len(), 0x80000);
    }
}
