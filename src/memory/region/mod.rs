/*!
 * Region Descriptor
 *
 * One contiguous memory region carved into fixed-size blocks. The descriptor
 * owns the occupancy table, a running free-block count and the simulated
 * backing bytes of the region.
 *
 * ## Address model
 *
 * Addresses are plain `usize` handles. A block index translates to
 * `base + index * block_size`; the reverse translation rejects addresses
 * outside `[base, base + block_size * block_count)` and addresses that do not
 * sit on a block boundary.
 */

mod allocator;
pub mod table;

pub use table::AllocTable;
use table::zeroed;

use crate::core::config::RegionConfig;
use crate::core::errors::{Counter, HeapError, HeapResult};
use crate::core::types::{Address, BlockIndex, Size};
use crate::memory::types::{BlockState, RegionSnapshot, SizeHistogram, Tier};
use tracing::{debug, warn};

/// Descriptor of one block-managed region
#[derive(Debug)]
pub struct Region {
    name: String,
    base: Address,
    block_size: Size,
    block_count: usize,
    align_blocks: usize,
    max_blocks_per_alloc: usize,
    table: AllocTable,
    free_blocks: usize,
    memory: Box<[u8]>,
}

impl Region {
    pub fn new(config: &RegionConfig) -> HeapResult<Self> {
        config.validate()?;
        let block_count = config.block_count();
        if config.size % config.block_size != 0 {
            warn!(
                region = %config.name,
                size = config.size,
                block_size = config.block_size,
                "Region size is not a whole number of blocks, trailing bytes unused"
            );
        }

        let table = AllocTable::new(block_count).map_err(|e| {
            HeapError::InvalidRegion(format!("{}: occupancy table: {}", config.name, e))
        })?;
        let memory = zeroed(block_count * config.block_size).map_err(|e| {
            HeapError::InvalidRegion(format!("{}: backing memory: {}", config.name, e))
        })?;
        debug!(
            region = %config.name,
            base = format_args!("0x{:x}", config.base),
            blocks = block_count,
            table_bytes = table.byte_len(),
            "Region descriptor created"
        );

        Ok(Self {
            name: config.name.clone(),
            base: config.base,
            block_size: config.block_size,
            block_count,
            align_blocks: config.align_blocks,
            max_blocks_per_alloc: config.max_blocks_per_alloc,
            table,
            free_blocks: block_count,
            memory,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Address {
        self.base
    }

    /// One past the last usable byte
    pub fn end(&self) -> Address {
        self.base + self.capacity()
    }

    pub fn block_size(&self) -> Size {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn capacity(&self) -> Size {
        self.block_count * self.block_size
    }

    pub fn align_blocks(&self) -> usize {
        self.align_blocks
    }

    pub fn max_blocks_per_alloc(&self) -> usize {
        self.max_blocks_per_alloc
    }

    pub fn free_blocks(&self) -> usize {
        self.free_blocks
    }

    pub fn free_bytes(&self) -> Size {
        self.free_blocks * self.block_size
    }

    pub fn used_bytes(&self) -> Size {
        self.capacity() - self.free_bytes()
    }

    pub fn table(&self) -> &AllocTable {
        &self.table
    }

    pub fn state(&self, block: BlockIndex) -> Option<BlockState> {
        (block < self.block_count).then(|| self.table.get(block))
    }

    pub fn contains(&self, address: Address) -> bool {
        address >= self.base && address < self.end()
    }

    pub fn overlaps(&self, base: Address, end: Address) -> bool {
        base < self.end() && self.base < end
    }

    pub fn address_of(&self, block: BlockIndex) -> Address {
        self.base + block * self.block_size
    }

    /// Translate an address to its block index, rejecting foreign or interior addresses
    pub fn index_of(&self, address: Address) -> HeapResult<BlockIndex> {
        if !self.contains(address) {
            return Err(HeapError::InvalidAddress(address));
        }
        let offset = address - self.base;
        if offset % self.block_size != 0 {
            return Err(HeapError::InvalidAddress(address));
        }
        Ok(offset / self.block_size)
    }

    /// Blocks reserved for a request of `bytes`, after alignment rounding
    pub fn blocks_for(&self, bytes: Size) -> usize {
        bytes
            .div_ceil(self.block_size)
            .next_multiple_of(self.align_blocks)
    }

    /// Length of the live run starting at `block`
    pub fn run_len(&self, block: BlockIndex) -> Option<usize> {
        self.table.run_len(block)
    }

    /// Bytes reserved by the allocation starting at `address`
    pub fn allocated_size(&self, address: Address) -> Option<Size> {
        let block = self.index_of(address).ok()?;
        self.run_len(block).map(|blocks| blocks * self.block_size)
    }

    /// Byte range from `address` to the end of the live run containing it
    fn payload_range(&self, address: Address) -> Option<std::ops::Range<usize>> {
        if !self.contains(address) {
            return None;
        }
        let offset = address - self.base;
        let head = self.table.head_of(offset / self.block_size)?;
        let blocks = self.table.run_len(head)?;
        let run_end = (head + blocks) * self.block_size;
        Some(offset..run_end)
    }

    /// Bytes from `address` to the end of its allocation
    pub fn payload(&self, address: Address) -> Option<&[u8]> {
        let range = self.payload_range(address)?;
        Some(&self.memory[range])
    }

    pub fn payload_mut(&mut self, address: Address) -> Option<&mut [u8]> {
        let range = self.payload_range(address)?;
        Some(&mut self.memory[range])
    }

    /// Free bytes counted by re-scanning the table (diagnostics only)
    pub fn scan_free_bytes(&self) -> Size {
        self.table.iter().filter(|s| *s == BlockState::Free).count() * self.block_size
    }

    /// Longest free run in blocks (diagnostics only)
    pub fn max_free_run(&self) -> usize {
        self.table.free_runs().map(|(_, len)| len).max().unwrap_or(0)
    }

    pub fn histogram(&self) -> SizeHistogram {
        let mut histogram = SizeHistogram::default();
        for (_, len) in self.table.live_runs() {
            histogram.record(len);
        }
        histogram
    }

    pub fn snapshot(&self, tier: Tier) -> RegionSnapshot {
        RegionSnapshot {
            name: self.name.clone(),
            tier,
            base: self.base,
            block_size: self.block_size,
            block_count: self.block_count,
            total: self.capacity(),
            used: self.used_bytes(),
            free: self.free_bytes(),
            max_free_run: self.max_free_run() * self.block_size,
            histogram: self.histogram(),
        }
    }

    /// Cross-check the table against its own invariants and the free-block counter
    pub fn check_invariants(&self) -> HeapResult<()> {
        let mut previous = BlockState::Free;
        let mut free = 0;
        for (block, state) in self.table.iter().enumerate() {
            match state {
                BlockState::Free => free += 1,
                BlockState::Tail if previous == BlockState::Free => {
                    return Err(HeapError::CorruptionDetected {
                        region: self.name.clone(),
                        block,
                    });
                }
                _ => {}
            }
            previous = state;
        }
        if free != self.free_blocks {
            return Err(HeapError::AccountingAnomaly {
                counter: Counter::FreeBlocks,
                delta: (free as i64 - self.free_blocks as i64) * self.block_size as i64,
            });
        }
        Ok(())
    }
}
