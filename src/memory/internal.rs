/*!
 * Internal Tier
 *
 * Reference allocator for the fast internal RAM tier, built on the same
 * region descriptor as the external tier: unaligned runs, no block cap, and
 * in-place resizing the way the collector's realloc behaves.
 */

use super::region::Region;
use super::traits::InternalTier;
use super::types::{RegionSnapshot, Tier};
use crate::core::config::InternalConfig;
use crate::core::errors::{HeapError, HeapResult};
use crate::core::types::{Address, AllocFlags, Size};
use std::ops::Range;
use tracing::debug;

/// Block heap serving the internal tier
#[derive(Debug)]
pub struct BlockHeap {
    region: Region,
}

impl BlockHeap {
    pub fn new(config: &InternalConfig) -> HeapResult<Self> {
        Ok(Self {
            region: Region::new(&config.region())?,
        })
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    fn head_of(&self, address: Address) -> HeapResult<usize> {
        let block = self.region.index_of(address)?;
        self.region
            .run_len(block)
            .map(|_| block)
            .ok_or(HeapError::InvalidAddress(address))
    }
}

impl InternalTier for BlockHeap {
    fn allocate(&mut self, n_bytes: Size, flags: AllocFlags) -> HeapResult<Address> {
        let address = self.region.allocate_address(n_bytes)?;
        if flags.contains(AllocFlags::HAS_FINALISER) {
            debug!(
                address = format_args!("0x{:x}", address),
                flags = flags.bits(),
                "Finaliser flag noted"
            );
        }
        Ok(address)
    }

    fn free(&mut self, address: Address) -> HeapResult<()> {
        self.region.free_address(address).map(|_| ())
    }

    fn size_of(&self, address: Address) -> Option<Size> {
        self.region.allocated_size(address)
    }

    fn realloc(
        &mut self,
        address: Address,
        n_bytes: Size,
        allow_move: bool,
    ) -> HeapResult<Address> {
        if n_bytes == 0 || n_bytes > self.region.capacity() {
            return Err(HeapError::InvalidSize {
                requested: n_bytes,
                capacity: self.region.capacity(),
            });
        }
        let head = self.head_of(address)?;
        let blocks = self.region.run_len(head).unwrap_or(0);
        let new_blocks = self.region.blocks_for(n_bytes);

        if new_blocks < blocks {
            self.region.shrink_run(head, new_blocks)?;
            return Ok(address);
        }
        if self.region.grow_run(head, new_blocks) {
            return Ok(address);
        }
        if !allow_move {
            return Err(HeapError::OutOfMemory {
                requested: n_bytes,
                free: self.region.free_bytes(),
            });
        }

        let moved = self.region.allocate_address(n_bytes)?;
        self.region
            .copy_within(address, moved, blocks * self.region.block_size())?;
        self.region.free_address(address)?;
        Ok(moved)
    }

    fn capacity(&self) -> Size {
        self.region.capacity()
    }

    fn span(&self) -> Range<Address> {
        self.region.base()..self.region.end()
    }

    fn payload(&self, address: Address) -> Option<&[u8]> {
        self.region.payload(address)
    }

    fn payload_mut(&mut self, address: Address) -> Option<&mut [u8]> {
        self.region.payload_mut(address)
    }

    fn snapshot(&self) -> Option<RegionSnapshot> {
        Some(self.region.snapshot(Tier::Internal))
    }

    fn scan_free_bytes(&self) -> Option<Size> {
        Some(self.region.scan_free_bytes())
    }

    fn free_run_at(&self, address: Address) -> Option<Size> {
        let block = self.region.index_of(address).ok()?;
        Some(self.region.free_run_around(block) * self.region.block_size())
    }
}
