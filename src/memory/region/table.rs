/*!
 * Allocation Table
 * Packed two-bit occupancy tags, four blocks per byte
 */

use crate::core::types::BlockIndex;
use crate::memory::types::BlockState;
use std::collections::TryReserveError;

pub const BLOCKS_PER_BYTE: usize = 4;
const BITS_PER_BLOCK: usize = 2;
const STATE_MASK: u8 = 0b11;

const FREE_BITS: u8 = 0b00;
const HEAD_BITS: u8 = 0b01;
const TAIL_BITS: u8 = 0b10;

/// Occupancy tags for every block of one region
#[derive(Debug, Clone)]
pub struct AllocTable {
    bytes: Box<[u8]>,
    len: usize,
}

impl AllocTable {
    /// All blocks start FREE; fails instead of aborting when the table cannot be allocated
    pub fn new(block_count: usize) -> Result<Self, TryReserveError> {
        Ok(Self {
            bytes: zeroed(block_count.div_ceil(BLOCKS_PER_BYTE))?,
            len: block_count,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes of metadata backing the table
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    fn locate(block: BlockIndex) -> (usize, usize) {
        (
            block / BLOCKS_PER_BYTE,
            (block % BLOCKS_PER_BYTE) * BITS_PER_BLOCK,
        )
    }

    #[inline]
    pub fn get(&self, block: BlockIndex) -> BlockState {
        debug_assert!(block < self.len);
        let (byte, shift) = Self::locate(block);
        match (self.bytes[byte] >> shift) & STATE_MASK {
            FREE_BITS => BlockState::Free,
            HEAD_BITS => BlockState::Head,
            TAIL_BITS => BlockState::Tail,
            // set() never writes the fourth pattern
            _ => unreachable!("invalid occupancy tag at block {}", block),
        }
    }

    #[inline]
    pub fn set(&mut self, block: BlockIndex, state: BlockState) {
        debug_assert!(block < self.len);
        let (byte, shift) = Self::locate(block);
        let bits = match state {
            BlockState::Free => FREE_BITS,
            BlockState::Head => HEAD_BITS,
            BlockState::Tail => TAIL_BITS,
        };
        self.bytes[byte] = (self.bytes[byte] & !(STATE_MASK << shift)) | (bits << shift);
    }

    #[inline]
    pub fn is_free(&self, block: BlockIndex) -> bool {
        self.get(block) == BlockState::Free
    }

    /// Tag `count` blocks from `start` as one run: HEAD then TAILs
    pub fn mark_run(&mut self, start: BlockIndex, count: usize) {
        debug_assert!(count > 0 && start + count <= self.len);
        self.set(start, BlockState::Head);
        for block in start + 1..start + count {
            self.set(block, BlockState::Tail);
        }
    }

    /// Length of the run whose HEAD is at `start`
    pub fn run_len(&self, start: BlockIndex) -> Option<usize> {
        if start >= self.len || self.get(start) != BlockState::Head {
            return None;
        }
        let mut end = start + 1;
        while end < self.len && self.get(end) == BlockState::Tail {
            end += 1;
        }
        Some(end - start)
    }

    /// HEAD of the live run containing `block`, walking back over TAILs
    pub fn head_of(&self, block: BlockIndex) -> Option<BlockIndex> {
        if block >= self.len {
            return None;
        }
        let mut cursor = block;
        loop {
            match self.get(cursor) {
                BlockState::Head => return Some(cursor),
                BlockState::Free => return None,
                BlockState::Tail if cursor == 0 => return None,
                BlockState::Tail => cursor -= 1,
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockState> + '_ {
        (0..self.len).map(move |block| self.get(block))
    }

    /// Live runs as `(head, length)` in address order
    pub fn live_runs(&self) -> LiveRuns<'_> {
        LiveRuns {
            table: self,
            cursor: 0,
        }
    }

    /// Maximal free runs as `(start, length)` in address order
    pub fn free_runs(&self) -> FreeRuns<'_> {
        FreeRuns {
            table: self,
            cursor: 0,
        }
    }
}

/// Zero-filled buffer of `len` bytes, allocated fallibly
pub(crate) fn zeroed(len: usize) -> Result<Box<[u8]>, TryReserveError> {
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len)?;
    bytes.resize(len, 0u8);
    Ok(bytes.into_boxed_slice())
}

pub struct LiveRuns<'a> {
    table: &'a AllocTable,
    cursor: BlockIndex,
}

impl Iterator for LiveRuns<'_> {
    type Item = (BlockIndex, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.table.len {
            let start = self.cursor;
            if let Some(len) = self.table.run_len(start) {
                self.cursor = start + len;
                return Some((start, len));
            }
            self.cursor += 1;
        }
        None
    }
}

pub struct FreeRuns<'a> {
    table: &'a AllocTable,
    cursor: BlockIndex,
}

impl Iterator for FreeRuns<'_> {
    type Item = (BlockIndex, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.table.len;
        while self.cursor < len && !self.table.is_free(self.cursor) {
            self.cursor += 1;
        }
        if self.cursor >= len {
            return None;
        }
        let start = self.cursor;
        while self.cursor < len && self.table.is_free(self.cursor) {
            self.cursor += 1;
        }
        Some((start, self.cursor - start))
    }
}
