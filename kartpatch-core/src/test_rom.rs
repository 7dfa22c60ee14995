//! Synthetic ROM images for tests.

use crate::codec::{compress, CodecOptions};
use crate::offsets::{literal, GameRegion, OffsetName, TRACK_COUNT};
use crate::rom::{CART_TYPE_LOCATION, RAM_SIZE_LOCATION, REGION_LOCATION, ROM_TYPE_LOCATION};
use crate::tracks::TRACK_MAP_SIZE;
use crate::Address;

pub(crate) const TRACK_TABLE: usize = 0x3_0000;
const FIRST_MAP: usize = 0x3_0100;

/// A plausible 128x128 tile map: road bands, some grass runs, a ramp.
pub(crate) fn sample_track_map(track: usize) -> Vec<u8> {
    let mut map = vec![0u8; TRACK_MAP_SIZE];
    for (i, tile) in map.iter_mut().enumerate() {
        let (x, y) = (i % 128, i / 128);
        *tile = if (x + track * 3) % 32 < 6 {
            0x40 + (y % 4) as u8
        } else if y % 16 == track % 16 {
            (x as u8).wrapping_add(track as u8)
        } else {
            0x07 + (track as u8 % 5)
        };
    }
    map
}

/// Builds a ROM of `size` bytes with valid signature bytes, the region byte,
/// and every track map stored (compressed twice) below the relocation window.
/// Returns the image and the uncompressed maps.
pub(crate) fn synthetic_rom(region: GameRegion, size: usize) -> (Vec<u8>, Vec<Vec<u8>>) {
    let mut rom = vec![0u8; size];
    rom[ROM_TYPE_LOCATION] = 0x31;
    rom[CART_TYPE_LOCATION] = 0x05;
    rom[RAM_SIZE_LOCATION] = 0x01;
    rom[REGION_LOCATION] = region as u8;

    let index = literal(region, OffsetName::TrackMapsIndex).unwrap();
    Address::new(TRACK_TABLE as u32)
        .unwrap()
        .write(&mut rom, index.as_usize())
        .unwrap();

    let options = CodecOptions::new(region.uses_codec_quirks(), false);
    let mut maps = Vec::with_capacity(TRACK_COUNT);
    let mut cursor = FIRST_MAP;
    for track in 0..TRACK_COUNT {
        let map = sample_track_map(track);
        let packed = compress(&compress(&map, options), options);
        rom[cursor..cursor + packed.len()].copy_from_slice(&packed);
        Address::from_usize(cursor)
            .unwrap()
            .write(&mut rom, TRACK_TABLE + track * 3)
            .unwrap();
        cursor += packed.len();
        maps.push(map);
    }
    assert!(cursor < 0x4_0000, "synthetic maps overflow the test area");

    (rom, maps)
}
