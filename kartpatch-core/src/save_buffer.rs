use log::{debug, warn};

use crate::address::{Address, Span, MAX_ADDRESS};
use crate::offsets::GameRegion;
use crate::rom::REGION_LOCATION;
use crate::{KartError, Result, KIB};

/// Start of the relocation window. Everything below it is left alone.
pub const RELOCATION_START: usize = 512 * KIB;
/// The window never extends past this point of the image.
pub const RELOCATION_LIMIT: usize = 1024 * KIB;
/// Most data a save can place in the window.
pub const MAX_RELOCATED_DATA: usize = RELOCATION_LIMIT - RELOCATION_START;

const SMALL_GROWTH: usize = 256 * KIB;
const LARGE_GROWTH: usize = 512 * KIB;
const BANK_SIZE: usize = 0x1_0000;
const BANK_MASK: usize = 0xF_0000;
const UNUSED_FILL: u8 = 0xFF;

/// Packs blocks of data into the relocation window and rewrites the
/// pointers that refer to them.
///
/// Blocks land in the order they are added, so a block's final address is
/// known the moment it is added: pointer bytes are written into the ROM
/// right away, the block data only when the buffer is finished.
pub struct SaveBuffer<'a> {
    rom: &'a mut Vec<u8>,
    bank_aligned: bool,
    range: Span,
    index: usize,
    blocks: Vec<Vec<u8>>,
}

impl<'a> SaveBuffer<'a> {
    /// Starts a save over `rom`, taking the region from its header.
    pub fn new(rom: &'a mut Vec<u8>) -> Result<Self> {
        let value = *rom
            .get(REGION_LOCATION)
            .ok_or(KartError::InvalidRomSize(rom.len()))?;
        let region = GameRegion::from_byte(value).ok_or(KartError::InvalidRegion {
            offset: REGION_LOCATION,
            value,
        })?;
        Ok(SaveBuffer::with_region(rom, region))
    }

    pub fn with_region(rom: &'a mut Vec<u8>, region: GameRegion) -> Self {
        let end = rom.len().min(RELOCATION_LIMIT);
        SaveBuffer {
            rom,
            bank_aligned: region.requires_bank_aligned_blocks(),
            range: Span::new(RELOCATION_START, end),
            index: RELOCATION_START,
            blocks: Vec::new(),
        }
    }

    /// Where the next block will be placed.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn range(&self) -> Span {
        self.range
    }

    /// The image as it currently stands, pointer rewrites included.
    pub fn rom(&self) -> &[u8] {
        &self.rom[..]
    }

    /// Whether `address` lies in the window this save is about to overwrite.
    pub fn includes(&self, address: usize) -> bool {
        self.range.includes(address)
    }

    pub fn add(&mut self, data: Vec<u8>) {
        debug!("block of {} bytes at 0x{:05X}", data.len(), self.index);
        self.index += data.len();
        self.blocks.push(data);
    }

    /// A pointer can only name a block that starts inside the address space.
    fn check_addressable(&self, start: usize, len: usize) -> Result<()> {
        if start > MAX_ADDRESS as usize {
            return Err(KartError::Capacity {
                needed: start + len - RELOCATION_START,
                available: MAX_RELOCATED_DATA,
            });
        }
        Ok(())
    }

    /// Adds `data` and points the 3-byte pointer at `pointer_location` to it.
    pub fn add_with_pointer(&mut self, data: Vec<u8>, pointer_location: usize) -> Result<()> {
        self.check_addressable(self.index, data.len())?;
        Address::from_usize(self.index)?.write(&mut self.rom[..], pointer_location)?;
        self.add(data);
        Ok(())
    }

    /// Like [`SaveBuffer::add_with_pointer`], for data the game decompresses.
    /// On US ROMs a block may not cross into another bank, so the cursor is
    /// first moved to the next bank with zero filler when it would.
    /// Nothing changes when the block cannot be placed.
    pub fn add_compressed(&mut self, data: Vec<u8>, pointer_location: usize) -> Result<()> {
        let end = self.index + data.len();
        let misaligned = self.index % BANK_SIZE;
        let padding = if self.bank_aligned
            && misaligned != 0
            && (self.index & BANK_MASK) != (end & BANK_MASK)
        {
            BANK_SIZE - misaligned
        } else {
            0
        };
        self.check_addressable(self.index + padding, data.len())?;
        if pointer_location + 3 > self.rom.len() {
            return Err(KartError::AddressOutOfRange(pointer_location as u32));
        }

        if padding > 0 {
            warn!(
                "padding {} bytes so a {} byte block starts on a bank boundary",
                padding,
                data.len()
            );
            self.add(vec![0u8; padding]);
        }
        self.add_with_pointer(data, pointer_location)
    }

    /// Writes every block into the window, growing the image when they do
    /// not fit, and fills what is left of the window with `0xFF`.
    /// Returns the span the blocks occupy.
    pub fn finish(mut self) -> Result<Span> {
        let total: usize = self.blocks.iter().map(Vec::len).sum();

        // Total data is capped at the window size, so growth stops at 1MiB,
        // far below the largest cartridge size.
        while total > self.range.len() {
            if total > MAX_RELOCATED_DATA {
                return Err(KartError::Capacity {
                    needed: total,
                    available: MAX_RELOCATED_DATA,
                });
            }
            let growth = if self.rom.len() == 512 * KIB && total > SMALL_GROWTH {
                LARGE_GROWTH
            } else {
                SMALL_GROWTH
            };
            let new_len = self.rom.len() + growth;
            warn!(
                "expanding ROM from {} KiB to {} KiB",
                self.rom.len() / KIB,
                new_len / KIB
            );
            self.rom.resize(new_len, 0);
            self.range.end = new_len;
        }

        let mut pos = self.range.start;
        for block in &self.blocks {
            self.rom[pos..pos + block.len()].copy_from_slice(block);
            pos += block.len();
        }
        if pos < self.range.end {
            self.rom[pos..self.range.end].fill(UNUSED_FILL);
        }

        debug!(
            "relocated {} blocks, {} of {} bytes used",
            self.blocks.len(),
            total,
            self.range.len()
        );
        Ok(Span::new(self.range.start, pos))
    }
}
