//! SNES cartridge checksum.
//!
//! The checksum is the 16-bit sum of every ROM byte. A ROM whose size is
//! not one of the nominal sizes is summed as if its tail were mirrored up
//! to the next nominal size, the way the console maps it.

use crate::rom::{CHECKSUM_COMPLEMENT_LOCATION, CHECKSUM_LOCATION, ROM_SIZE_LOCATION};
use crate::KIB;

/// Nominal ROM sizes; the header size code is `8 + index`.
const SIZE_BUCKETS: [usize; 6] = [
    256 * KIB,
    512 * KIB,
    1024 * KIB,
    2048 * KIB,
    4096 * KIB,
    8192 * KIB,
];

const SIZE_CODE_BASE: u8 = 8;

fn sum(bytes: &[u8]) -> u64 {
    bytes.iter().map(|&b| b as u64).sum()
}

fn write_u16(rom: &mut [u8], location: usize, value: u16) {
    rom[location..location + 2].copy_from_slice(&value.to_le_bytes());
}

fn read_u16(rom: &[u8], location: usize) -> u16 {
    u16::from_le_bytes([rom[location], rom[location + 1]])
}

/// Header size code for a ROM of `len` bytes.
pub fn size_code(len: usize) -> u8 {
    let index = SIZE_BUCKETS
        .iter()
        .position(|&bucket| bucket >= len)
        .unwrap_or(SIZE_BUCKETS.len() - 1);
    SIZE_CODE_BASE + index as u8
}

/// Sum of the whole image with the non-power-of-two tail mirrored.
fn mirrored_sum(rom: &[u8]) -> u64 {
    let len = rom.len();
    let Some(index) = SIZE_BUCKETS.iter().position(|&bucket| bucket >= len) else {
        return sum(rom);
    };
    if SIZE_BUCKETS[index] == len || index == 0 {
        return sum(rom);
    }

    let lower = SIZE_BUCKETS[index - 1];
    let upper = SIZE_BUCKETS[index];
    let tail = &rom[lower..];
    let repeat = ((upper - lower) / tail.len()) as u64;
    sum(&rom[..lower]) + sum(tail) * repeat
}

/// Writes the size code, then recomputes and stores the checksum and its
/// complement. Returns `(checksum, complement)`, or `None` without touching
/// a buffer too short to hold the header.
pub fn update(rom: &mut [u8]) -> Option<(u16, u16)> {
    if rom.len() < CHECKSUM_LOCATION + 2 {
        return None;
    }

    rom[ROM_SIZE_LOCATION] = size_code(rom.len());
    // Stale values must not feed into the new sum.
    write_u16(rom, CHECKSUM_COMPLEMENT_LOCATION, 0xFFFF);
    write_u16(rom, CHECKSUM_LOCATION, 0x0000);

    let checksum = (mirrored_sum(rom) & 0xFFFF) as u16;
    let complement = 0xFFFF - checksum;
    write_u16(rom, CHECKSUM_COMPLEMENT_LOCATION, complement);
    write_u16(rom, CHECKSUM_LOCATION, checksum);
    Some((checksum, complement))
}

/// The `(checksum, complement)` pair stored in the header.
pub fn stored(rom: &[u8]) -> Option<(u16, u16)> {
    if rom.len() < CHECKSUM_LOCATION + 2 {
        return None;
    }
    Some((
        read_u16(rom, CHECKSUM_LOCATION),
        read_u16(rom, CHECKSUM_COMPLEMENT_LOCATION),
    ))
}

/// Whether the stored pair matches a fresh computation.
pub fn verify(rom: &[u8]) -> bool {
    let Some(current) = stored(rom) else {
        return false;
    };
    let mut copy = rom.to_vec();
    update(&mut copy) == Some(current)
}
