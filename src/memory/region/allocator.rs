/*!
 * Block Allocator
 *
 * First-fit run placement over a region's occupancy table. The scan is a
 * single forward pass with no backtracking, so every call is bounded by the
 * region's block count.
 */

use super::Region;
use crate::core::errors::{HeapError, HeapResult};
use crate::core::types::{Address, BlockIndex, Size};
use crate::memory::types::BlockState;
use tracing::debug;

impl Region {
    /// Reserve a run for `requested` bytes and return its HEAD block
    pub fn allocate(&mut self, requested: Size) -> HeapResult<BlockIndex> {
        if requested == 0 || requested > self.capacity() {
            return Err(HeapError::InvalidSize {
                requested,
                capacity: self.capacity(),
            });
        }

        let blocks = self.blocks_for(requested);
        if blocks > self.max_blocks_per_alloc || blocks > self.block_count {
            debug!(
                region = %self.name,
                requested,
                blocks,
                cap = self.max_blocks_per_alloc,
                "Request exceeds the per-allocation block cap"
            );
            return Err(HeapError::InvalidSize {
                requested,
                capacity: self.max_blocks_per_alloc.min(self.block_count) * self.block_size,
            });
        }

        let start = self.find_run(blocks).ok_or(HeapError::OutOfMemory {
            requested,
            free: self.free_bytes(),
        })?;
        self.claim(start, blocks);

        debug!(
            region = %self.name,
            requested,
            start,
            blocks,
            free_blocks = self.free_blocks,
            "Reserved block run"
        );
        Ok(start)
    }

    /// Reserve a run and return its address
    pub fn allocate_address(&mut self, requested: Size) -> HeapResult<Address> {
        self.allocate(requested).map(|block| self.address_of(block))
    }

    /// First run of `blocks` consecutive FREE blocks, lowest index wins
    pub fn find_run(&self, blocks: usize) -> Option<BlockIndex> {
        if blocks == 0 || blocks > self.free_blocks {
            return None;
        }
        let mut run = 0;
        let mut start = 0;
        for block in 0..self.block_count {
            if self.table.is_free(block) {
                if run == 0 {
                    start = block;
                }
                run += 1;
                if run == blocks {
                    return Some(start);
                }
            } else {
                run = 0;
            }
        }
        None
    }

    fn claim(&mut self, start: BlockIndex, blocks: usize) {
        self.table.mark_run(start, blocks);
        self.free_blocks -= blocks;
        let from = start * self.block_size;
        self.memory[from..from + blocks * self.block_size].fill(0);
    }

    /// Release the run whose HEAD is `block`; returns the blocks released
    ///
    /// Clears the HEAD, then every following TAIL, and stops at the first
    /// block that is not a TAIL. FREE and TAIL starts are rejected without
    /// touching the table, which also rejects a second free of the same run.
    pub fn free(&mut self, block: BlockIndex) -> HeapResult<usize> {
        if block >= self.block_count || self.table.get(block) != BlockState::Head {
            return Err(HeapError::InvalidFree(
                self.base
                    .saturating_add(block.saturating_mul(self.block_size)),
            ));
        }

        self.table.set(block, BlockState::Free);
        let mut released = 1;
        let mut cursor = block + 1;
        while cursor < self.block_count && self.table.get(cursor) == BlockState::Tail {
            self.table.set(cursor, BlockState::Free);
            released += 1;
            cursor += 1;
        }
        self.free_blocks += released;

        debug!(
            region = %self.name,
            start = block,
            blocks = released,
            free_blocks = self.free_blocks,
            "Released block run"
        );
        Ok(released)
    }

    /// Release the allocation starting at `address`
    pub fn free_address(&mut self, address: Address) -> HeapResult<usize> {
        let block = self
            .index_of(address)
            .map_err(|_| HeapError::InvalidFree(address))?;
        self.free(block)
            .map_err(|_| HeapError::InvalidFree(address))
    }

    /// Length in blocks of the maximal free run containing `block`
    pub fn free_run_around(&self, block: BlockIndex) -> usize {
        if block >= self.block_count || !self.table.is_free(block) {
            return 0;
        }
        let mut start = block;
        while start > 0 && self.table.is_free(start - 1) {
            start -= 1;
        }
        let mut end = block + 1;
        while end < self.block_count && self.table.is_free(end) {
            end += 1;
        }
        end - start
    }

    /// Give back the blocks of a run beyond its first `new_blocks`
    pub fn shrink_run(&mut self, head: BlockIndex, new_blocks: usize) -> HeapResult<usize> {
        let blocks = self
            .run_len(head)
            .ok_or_else(|| HeapError::InvalidAddress(self.address_of(head)))?;
        if new_blocks == 0 || new_blocks > blocks {
            return Err(HeapError::InvalidSize {
                requested: new_blocks * self.block_size,
                capacity: blocks * self.block_size,
            });
        }
        for block in head + new_blocks..head + blocks {
            self.table.set(block, BlockState::Free);
        }
        let released = blocks - new_blocks;
        self.free_blocks += released;
        Ok(released)
    }

    /// Extend a run in place over the FREE blocks directly after it
    ///
    /// Returns false, leaving the table untouched, when those blocks are not
    /// all FREE or the run would pass the region end or the block cap.
    pub fn grow_run(&mut self, head: BlockIndex, new_blocks: usize) -> bool {
        let blocks = match self.run_len(head) {
            Some(blocks) => blocks,
            None => return false,
        };
        if new_blocks <= blocks {
            return true;
        }
        if new_blocks > self.max_blocks_per_alloc || head + new_blocks > self.block_count {
            return false;
        }
        if !(head + blocks..head + new_blocks).all(|block| self.table.is_free(block)) {
            return false;
        }

        for block in head + blocks..head + new_blocks {
            self.table.set(block, BlockState::Tail);
        }
        self.free_blocks -= new_blocks - blocks;
        let from = (head + blocks) * self.block_size;
        let to = (head + new_blocks) * self.block_size;
        self.memory[from..to].fill(0);
        true
    }

    /// Copy `len` bytes between two addresses of this region
    pub fn copy_within(&mut self, from: Address, to: Address, len: Size) -> HeapResult<()> {
        let src = self
            .payload_range(from)
            .filter(|range| range.len() >= len)
            .ok_or(HeapError::InvalidAddress(from))?;
        let dst = self
            .payload_range(to)
            .filter(|range| range.len() >= len)
            .ok_or(HeapError::InvalidAddress(to))?;
        self.memory
            .copy_within(src.start..src.start + len, dst.start);
        Ok(())
    }
}
