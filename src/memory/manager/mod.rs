/*!
 * Tiered Heap
 *
 * Delegation layer in front of two memory tiers: a fast internal tier owned by
 * an [`InternalTier`] delegate, and any number of block-managed external
 * regions registered at bootstrap.
 *
 * ## Routing
 *
 * - **Large requests** (`>= large_object_threshold`): every external region in
 *   registration order, first success wins, then the internal tier
 * - **Small requests**: internal tier only
 *
 * ## Accounting
 *
 * - One running free-byte counter across every tier, debited by the bytes
 *   actually reserved and credited on free; it saturates instead of wrapping
 * - Cumulative statistics in [`AllocationStats`], failures in [`PressureStats`]
 * - Emergency flag set below `emergency_reserve` free bytes and cleared once a
 *   free or shrink brings the counter back up
 * - Bookkeeping irregularities are recorded as [`Anomaly`] entries, never
 *   propagated
 */

mod allocator;
mod diagnostics;
mod shared;
mod storage;
mod tracking;

pub use shared::SharedHeap;

use super::internal::BlockHeap;
use super::region::Region;
use super::traits::InternalTier;
use super::types::{Anomaly, AllocationStats, PressureStats, Tier};
use crate::core::config::{EmergencyPolicy, HeapConfig, HeapPolicy, RegionConfig};
use crate::core::errors::{HeapError, HeapResult};
use crate::core::types::{Address, Size};
use tracing::info;
use tracking::AnomalyLog;

/// Two-tier heap: internal delegate plus external block regions
#[derive(Debug)]
pub struct TieredHeap<I: InternalTier> {
    internal: I,
    regions: Vec<Region>,
    policy: HeapPolicy,
    total_capacity: Size,
    free_bytes: Size,
    emergency: bool,
    stats: AllocationStats,
    pressure_stats: PressureStats,
    anomalies: AnomalyLog,
    lock_depth: usize,
}

impl<I: InternalTier> TieredHeap<I> {
    /// Take ownership of the internal tier; its capacity seeds the free-byte counter
    pub fn new(policy: HeapPolicy, internal: I) -> Self {
        let capacity = internal.capacity();
        info!(
            internal_capacity = capacity,
            large_object_threshold = policy.large_object_threshold,
            emergency_reserve = policy.emergency_reserve,
            emergency_policy = ?policy.emergency_policy,
            "Tiered heap initialized"
        );
        let mut heap = Self {
            internal,
            regions: Vec::new(),
            policy,
            total_capacity: capacity,
            free_bytes: capacity,
            emergency: false,
            stats: AllocationStats::default(),
            pressure_stats: PressureStats::default(),
            anomalies: AnomalyLog::default(),
            lock_depth: 0,
        };
        heap.update_emergency();
        heap
    }

    /// Register an external region; returns its index for [`Tier::External`]
    pub fn register_region(&mut self, config: &RegionConfig) -> HeapResult<usize> {
        let region = Region::new(config)?;
        let (base, end) = (region.base(), region.end());

        let span = self.internal.span();
        let hits_internal = span.start < end && base < span.end;
        if hits_internal || self.regions.iter().any(|r| r.overlaps(base, end)) {
            return Err(HeapError::RegionOverlap {
                name: config.name.clone(),
                base,
                end,
            });
        }

        let id = self.regions.len();
        let capacity = region.capacity();
        self.total_capacity += capacity;
        self.free_bytes += capacity;
        self.regions.push(region);

        info!(
            region = %config.name,
            id,
            base = format_args!("0x{:x}", base),
            capacity,
            block_size = config.block_size,
            align_blocks = config.align_blocks,
            "External region registered"
        );
        self.update_emergency();
        Ok(id)
    }

    /// Forbid allocation and free until the matching `unlock`; nests
    pub fn lock(&mut self) {
        self.lock_depth += 1;
    }

    pub fn unlock(&mut self) {
        if self.lock_depth == 0 {
            self.anomalies.record(Anomaly::UnbalancedUnlock);
            return;
        }
        self.lock_depth -= 1;
    }

    pub fn is_locked(&self) -> bool {
        self.lock_depth > 0
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: usize) -> Option<&Region> {
        self.regions.get(id)
    }

    pub fn internal(&self) -> &I {
        &self.internal
    }

    pub fn policy(&self) -> &HeapPolicy {
        &self.policy
    }

    pub fn set_emergency_policy(&mut self, policy: EmergencyPolicy) {
        self.policy.emergency_policy = policy;
    }

    /// Bytes across every tier when empty
    pub fn total_capacity(&self) -> Size {
        self.total_capacity
    }

    /// The running free-byte counter
    pub fn free_bytes(&self) -> Size {
        self.free_bytes
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    pub fn stats(&self) -> &AllocationStats {
        &self.stats
    }

    pub fn pressure_stats(&self) -> &PressureStats {
        &self.pressure_stats
    }

    /// Every anomaly recorded so far, including those evicted from the log
    pub fn anomaly_count(&self) -> usize {
        self.anomalies.count()
    }

    /// Tier owning `address` by range membership
    pub fn region_of(&self, address: Address) -> Option<Tier> {
        if let Some(id) = self.regions.iter().position(|r| r.contains(address)) {
            return Some(Tier::External(id));
        }
        self.internal.contains(address).then_some(Tier::Internal)
    }

    /// Bytes accounted to the live allocation starting at `address`
    pub fn size_of(&self, address: Address) -> Option<Size> {
        match self.region_of(address)? {
            Tier::External(id) => self.regions[id].allocated_size(address),
            Tier::Internal => self.internal.size_of(address),
        }
    }

    /// Largest request any single tier could ever satisfy
    fn max_tier_capacity(&self) -> Size {
        self.regions
            .iter()
            .map(Region::capacity)
            .fold(self.internal.capacity(), Size::max)
    }
}

impl TieredHeap<BlockHeap> {
    /// Bootstrap a heap with the reference internal tier and every configured region
    pub fn from_config(config: &HeapConfig) -> HeapResult<Self> {
        config.validate()?;
        let internal = BlockHeap::new(&config.internal)?;
        let mut heap = Self::new(config.policy.clone(), internal);
        for region in &config.regions {
            heap.register_region(region)?;
        }
        Ok(heap)
    }
}
