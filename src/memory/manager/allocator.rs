/*!
 * Tiered Allocator Implementation
 * Routing of allocate, free and realloc across the tiers
 */

use super::TieredHeap;
use crate::core::config::EmergencyPolicy;
use crate::core::errors::{HeapError, HeapResult};
use crate::core::types::{Address, AllocFlags, Size};
use crate::memory::traits::InternalTier;
use crate::memory::types::Tier;
use tracing::{debug, error, warn};

impl<I: InternalTier> TieredHeap<I> {
    /// Allocate `n_bytes`, routing by size; never panics on exhaustion
    pub fn allocate(&mut self, n_bytes: Size, flags: AllocFlags) -> HeapResult<Address> {
        if self.is_locked() {
            return Err(HeapError::HeapLocked);
        }
        let max_capacity = self.max_tier_capacity();
        if n_bytes == 0 || n_bytes > max_capacity {
            return Err(HeapError::InvalidSize {
                requested: n_bytes,
                capacity: max_capacity,
            });
        }

        let large = n_bytes >= self.policy.large_object_threshold;
        if large
            && self.emergency
            && self.policy.emergency_policy == EmergencyPolicy::DenyLarge
        {
            self.pressure_stats.alloc_fail_fast += 1;
            warn!(
                requested = n_bytes,
                free = self.free_bytes,
                reserve = self.policy.emergency_reserve,
                "Large allocation denied in emergency mode"
            );
            return Err(HeapError::EmergencyDenied {
                requested: n_bytes,
                free: self.free_bytes,
                reserve: self.policy.emergency_reserve,
            });
        }

        if large {
            if let Some(address) = self.allocate_external(n_bytes) {
                return Ok(address);
            }
        }

        match self.internal.allocate(n_bytes, flags) {
            Ok(address) => {
                let size = self.internal.size_of(address).unwrap_or(n_bytes);
                self.record_allocation(size);
                debug!(
                    tier = %Tier::Internal,
                    requested = n_bytes,
                    size,
                    address = format_args!("0x{:x}", address),
                    free = self.free_bytes,
                    "Allocated"
                );
                Ok(address)
            }
            Err(e) if e.is_exhaustion() || matches!(e, HeapError::InvalidSize { .. }) => {
                self.pressure_stats.alloc_fail_full += 1;
                error!(
                    requested = n_bytes,
                    free = self.free_bytes,
                    emergency = self.emergency,
                    "OOM: no tier could satisfy the request"
                );
                Err(HeapError::OutOfMemory {
                    requested: n_bytes,
                    free: self.free_bytes,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// First external region, in registration order, with room for `n_bytes`
    fn allocate_external(&mut self, n_bytes: Size) -> Option<Address> {
        let (id, block) = self
            .regions
            .iter_mut()
            .enumerate()
            .find_map(|(id, region)| region.allocate(n_bytes).ok().map(|block| (id, block)))?;

        let region = &self.regions[id];
        let address = region.address_of(block);
        let size = region.run_len(block).unwrap_or(0) * region.block_size();
        self.record_allocation(size);
        debug!(
            tier = %Tier::External(id),
            requested = n_bytes,
            size,
            address = format_args!("0x{:x}", address),
            free = self.free_bytes,
            "Allocated"
        );
        Some(address)
    }

    /// Free the allocation starting at `address`
    ///
    /// The accounted size is read before the occupancy changes. Unknown or
    /// interior addresses are rejected without mutation and recorded.
    pub fn free(&mut self, address: Address) -> HeapResult<()> {
        if self.is_locked() {
            return Err(HeapError::HeapLocked);
        }
        let Some(size) = self.size_of(address) else {
            self.record_invalid_free(address);
            return Err(HeapError::InvalidFree(address));
        };

        let free_run = match self.region_of(address) {
            Some(Tier::External(id)) => {
                let region = &mut self.regions[id];
                let block = region.index_of(address)?;
                region.free(block)?;
                region.free_run_around(block) * region.block_size()
            }
            _ => {
                self.internal.free(address)?;
                self.internal.free_run_at(address).unwrap_or(0)
            }
        };

        self.record_free(size, free_run);
        debug!(
            address = format_args!("0x{:x}", address),
            size,
            free = self.free_bytes,
            "Freed"
        );
        Ok(())
    }

    /// Resize the allocation at `address` to `new_size` bytes
    ///
    /// In place when the current tier allows it. Otherwise, with `allow_move`,
    /// the data moves to a fresh allocation routed like any other request; a
    /// failed move leaves the old allocation untouched.
    ///
    /// A move goes through `allocate` and `free`, so the statistics see one
    /// allocation plus one free, and a move nothing can hold counts as a
    /// full-search failure (or a fast failure when the emergency policy
    /// refuses it) in the pressure counters. In-place resizes only adjust
    /// the byte totals.
    pub fn realloc(
        &mut self,
        address: Address,
        new_size: Size,
        allow_move: bool,
    ) -> HeapResult<Address> {
        if self.is_locked() {
            return Err(HeapError::HeapLocked);
        }
        if new_size == 0 {
            return Err(HeapError::InvalidSize {
                requested: 0,
                capacity: self.max_tier_capacity(),
            });
        }
        let (Some(tier), Some(old_size)) = (self.region_of(address), self.size_of(address)) else {
            self.record_invalid_free(address);
            return Err(HeapError::InvalidFree(address));
        };

        match tier {
            Tier::External(id) => {
                let region = &self.regions[id];
                let reserved = old_size / region.block_size();
                if region.blocks_for(new_size) <= reserved {
                    return Ok(address);
                }
            }
            Tier::Internal => match self.internal.realloc(address, new_size, false) {
                Ok(resized) => {
                    let size = self.internal.size_of(resized).unwrap_or(new_size);
                    self.apply_resize(old_size, size);
                    return Ok(resized);
                }
                Err(e) if !e.is_exhaustion() && !matches!(e, HeapError::InvalidSize { .. }) => {
                    return Err(e);
                }
                Err(_) => {}
            },
        }

        if !allow_move {
            return Err(HeapError::OutOfMemory {
                requested: new_size,
                free: self.free_bytes,
            });
        }
        self.move_allocation(address, old_size, new_size)
    }

    fn move_allocation(
        &mut self,
        address: Address,
        old_size: Size,
        new_size: Size,
    ) -> HeapResult<Address> {
        let moved = self.allocate(new_size, AllocFlags::NONE)?;
        let len = old_size.min(new_size);
        let data = self.read_bytes(address, len)?;
        self.write_bytes(moved, &data)?;
        self.free(address)?;
        debug!(
            from = format_args!("0x{:x}", address),
            to = format_args!("0x{:x}", moved),
            old_size,
            new_size,
            "Moved allocation"
        );
        Ok(moved)
    }
}
