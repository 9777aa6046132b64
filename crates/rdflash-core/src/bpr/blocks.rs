//! Mapping between flash address ranges and protection bits
//!
//! The SST26VF032B divides its 4 MiB into blocks of uneven size. The 8 KiB
//! blocks at both ends of the array have a write-lock and a read-lock bit;
//! every other block only has a write-lock bit.

use alloc::vec::Vec;

use bitflags::bitflags;

use super::ProtectionBitmap;

bitflags! {
    /// Lock kinds that can be active on a block
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LockFlags: u8 {
        /// Erase and program are blocked
        const WRITE = 1 << 0;
        /// Reads return garbage
        const READ  = 1 << 1;
    }
}

/// One independently protected address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionBlock {
    /// Start address (inclusive)
    pub start: u32,
    /// End address (exclusive)
    pub end: u32,
    /// Bit index of the write lock
    pub write_lock: u8,
    /// Bit index of the read lock, if the block has one
    pub read_lock: Option<u8>,
}

impl ProtectionBlock {
    const fn new(start: u32, len: u32, write_lock: u8, read_lock: Option<u8>) -> Self {
        Self {
            start,
            end: start + len,
            write_lock,
            read_lock,
        }
    }

    /// Check if the block shares any byte with `[start, end)`
    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        self.start < end && start < self.end
    }

    /// Locks set for this block in `bitmap`
    pub fn locks(&self, bitmap: &ProtectionBitmap) -> LockFlags {
        let mut flags = LockFlags::empty();
        if bitmap.bit(self.write_lock) {
            flags |= LockFlags::WRITE;
        }
        if let Some(bit) = self.read_lock {
            if bitmap.bit(bit) {
                flags |= LockFlags::READ;
            }
        }
        flags
    }
}

/// Block-to-bit table of a flash device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMap {
    blocks: Vec<ProtectionBlock>,
}

impl BlockMap {
    /// Create a map from an explicit block list
    pub fn new(mut blocks: Vec<ProtectionBlock>) -> Self {
        blocks.sort_by_key(|b| b.start);
        Self { blocks }
    }

    /// Layout of the SST26VF032B (see the datasheet's BPR table)
    pub fn sst26vf032b() -> Self {
        const KIB: u32 = 1024;
        let mut blocks = Vec::with_capacity(72);

        // Four 8 KiB boot blocks with read and write locks
        for i in 0..4u8 {
            blocks.push(ProtectionBlock::new(
                i as u32 * 8 * KIB,
                8 * KIB,
                64 + 2 * i,
                Some(65 + 2 * i),
            ));
        }
        blocks.push(ProtectionBlock::new(0x00_8000, 32 * KIB, 62, None));

        // 62 uniform 64 KiB blocks
        for i in 0..62u8 {
            blocks.push(ProtectionBlock::new(
                0x01_0000 + i as u32 * 64 * KIB,
                64 * KIB,
                i,
                None,
            ));
        }

        blocks.push(ProtectionBlock::new(0x3F_0000, 32 * KIB, 63, None));
        for i in 0..4u8 {
            blocks.push(ProtectionBlock::new(
                0x3F_8000 + i as u32 * 8 * KIB,
                8 * KIB,
                72 + 2 * i,
                Some(73 + 2 * i),
            ));
        }

        Self { blocks }
    }

    /// All blocks, sorted by address
    pub fn blocks(&self) -> &[ProtectionBlock] {
        &self.blocks
    }

    /// Maximally protected bitmap: every write lock set, every read lock clear
    pub fn baseline(&self) -> ProtectionBitmap {
        let mut bitmap = ProtectionBitmap::NONE;
        for block in &self.blocks {
            bitmap.set_bit(block.write_lock);
        }
        bitmap
    }

    /// Mask that unlocks `[start, end)`
    ///
    /// Every bit of every block overlapping the range is cleared; all other
    /// bits are set, so ANDing the mask into a bitmap leaves protection of
    /// unrelated blocks untouched.
    pub fn mask_for(&self, start: u32, end: u32) -> ProtectionBitmap {
        let mut mask = ProtectionBitmap::ALL_SET;
        for block in self.blocks.iter().filter(|b| b.overlaps(start, end)) {
            mask.clear_bit(block.write_lock);
            if let Some(bit) = block.read_lock {
                mask.clear_bit(bit);
            }
        }
        mask
    }

    /// Blocks that overlap `[start, end)`
    pub fn blocks_in(&self, start: u32, end: u32) -> impl Iterator<Item = &ProtectionBlock> + '_ {
        self.blocks.iter().filter(move |b| b.overlaps(start, end))
    }

    /// Lock state of every block in `bitmap`
    pub fn locks<'a>(
        &'a self,
        bitmap: &'a ProtectionBitmap,
    ) -> impl Iterator<Item = (&'a ProtectionBlock, LockFlags)> + 'a {
        self.blocks.iter().map(move |b| (b, b.locks(bitmap)))
    }
}

impl Default for BlockMap {
    fn default() -> Self {
        Self::sst26vf032b()
    }
}
