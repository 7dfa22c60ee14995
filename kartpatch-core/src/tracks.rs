use log::info;
use std::collections::BTreeMap;

use crate::codec::{compress, compressed_chunk, decompress, decompress_at, CodecOptions};
use crate::offsets::{OffsetName, TRACK_COUNT};
use crate::{Address, KartError, Result, RomImage, SaveBuffer};

/// A track map is 128x128 tile indices.
pub const TRACK_MAP_SIZE: usize = 128 * 128;

const POINTER_SIZE: usize = 3;

fn check_track(track: usize) -> Result<()> {
    if track >= TRACK_COUNT {
        return Err(KartError::Config(format!(
            "track {track} does not exist (0..{TRACK_COUNT})"
        )));
    }
    Ok(())
}

impl RomImage {
    fn track_map_slot(&self, track: usize) -> usize {
        self.offsets()[OffsetName::TrackMaps].as_usize() + track * POINTER_SIZE
    }

    /// Where the compressed map of `track` currently starts.
    pub fn track_map_address(&self, track: usize) -> Result<Address> {
        check_track(track)?;
        Address::read(self.data(), self.track_map_slot(track))
    }

    /// The decompressed tile map of `track`. Maps are stored compressed twice.
    pub fn track_map(&self, track: usize) -> Result<Vec<u8>> {
        let address = self.track_map_address(track)?;
        let once = decompress_at(self.data(), address.as_usize())?;
        decompress(&once)
    }

    /// Writes edited track maps back and re-lays out the relocation window.
    ///
    /// Maps already living in the window are carried over byte for byte,
    /// since the window is rewritten from scratch. The image is only
    /// replaced once every map has been placed.
    pub fn save_track_maps(&mut self, edits: &BTreeMap<usize, Vec<u8>>, optimal: bool) -> Result<()> {
        for (&track, map) in edits {
            check_track(track)?;
            if map.len() != TRACK_MAP_SIZE {
                return Err(KartError::Config(format!(
                    "track {track} map is {} bytes, expected {TRACK_MAP_SIZE}",
                    map.len()
                )));
            }
        }

        let region = self.region();
        let options = CodecOptions::new(region.uses_codec_quirks(), optimal);
        let slots: Vec<usize> = (0..TRACK_COUNT).map(|track| self.track_map_slot(track)).collect();

        let mut data = self.data().to_vec();
        let mut buffer = SaveBuffer::with_region(&mut data, region);
        for (track, &slot) in slots.iter().enumerate() {
            let packed = match edits.get(&track) {
                Some(map) => compress(&compress(map, options), options),
                None => {
                    let address = Address::read(buffer.rom(), slot)?.as_usize();
                    if !buffer.includes(address) {
                        continue;
                    }
                    compressed_chunk(buffer.rom(), address)?.to_vec()
                }
            };
            buffer.add_compressed(packed, slot)?;
        }
        let used = buffer.finish()?;

        *self.data_mut() = data;
        self.update_checksum();
        info!(
            "saved {} edited track maps, {} bytes relocated",
            edits.len(),
            used.len()
        );
        Ok(())
    }
}
