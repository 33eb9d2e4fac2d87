/*!
 * Memory Traits
 * Seams between the delegation layer and its collaborators
 */

use super::types::*;
use crate::core::errors::HeapResult;
use crate::core::types::{Address, AllocFlags, Size};
use std::ops::Range;

/// Allocator owning the fast internal RAM tier
///
/// The delegation layer only calls these primitives; it never inspects the
/// tier's own metadata.
pub trait InternalTier: Send {
    /// Allocate `n_bytes`; flags are the tier's own business
    fn allocate(&mut self, n_bytes: Size, flags: AllocFlags) -> HeapResult<Address>;

    /// Free the allocation starting at `address`
    fn free(&mut self, address: Address) -> HeapResult<()>;

    /// Bytes reserved for the allocation starting at `address`
    fn size_of(&self, address: Address) -> Option<Size>;

    /// Resize; with `allow_move == false` only in-place resizing is allowed
    fn realloc(&mut self, address: Address, n_bytes: Size, allow_move: bool)
        -> HeapResult<Address>;

    /// Bytes the tier can hand out when empty
    fn capacity(&self) -> Size;

    /// Address range the tier hands out from
    fn span(&self) -> Range<Address>;

    fn contains(&self, address: Address) -> bool {
        self.span().contains(&address)
    }

    /// Bytes from `address` to the end of its allocation
    fn payload(&self, address: Address) -> Option<&[u8]>;

    fn payload_mut(&mut self, address: Address) -> Option<&mut [u8]>;

    /// Occupancy view for diagnostics, if the tier can provide one
    fn snapshot(&self) -> Option<RegionSnapshot> {
        None
    }

    /// Free bytes by re-scanning the tier's metadata, if supported
    fn scan_free_bytes(&self) -> Option<Size> {
        None
    }

    /// Length in bytes of the free run containing `address`, if tracked
    fn free_run_at(&self, _address: Address) -> Option<Size> {
        None
    }
}

/// Read-only heap statistics provider
pub trait HeapInfo {
    /// Consistent snapshot of the whole heap
    fn snapshot(&self) -> HeapSnapshot;

    /// Heap totals as (total, used, free)
    fn info(&self) -> (Size, Size, Size) {
        let snapshot = self.snapshot();
        (snapshot.total, snapshot.used, snapshot.free)
    }

    /// Get memory pressure level
    fn pressure(&self) -> MemoryPressure {
        self.snapshot().pressure
    }
}
