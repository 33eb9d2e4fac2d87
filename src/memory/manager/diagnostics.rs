/*!
 * Heap Diagnostics
 * Snapshots and consistency validation
 */

use super::TieredHeap;
use crate::core::errors::{Counter, HeapError, HeapResult};
use crate::memory::traits::{HeapInfo, InternalTier};
use crate::memory::types::{HeapSnapshot, MemoryPressure, SizeHistogram, Tier};
use tracing::debug;

impl<I: InternalTier> TieredHeap<I> {
    /// Point-in-time view of every tier; scans occupancy but mutates nothing
    pub fn snapshot(&self) -> HeapSnapshot {
        let mut regions = Vec::with_capacity(self.regions.len() + 1);
        regions.extend(self.internal.snapshot());
        regions.extend(
            self.regions
                .iter()
                .enumerate()
                .map(|(id, region)| region.snapshot(Tier::External(id))),
        );

        let mut histogram = SizeHistogram::default();
        for region in &regions {
            histogram.merge(&region.histogram);
        }
        let max_free_run = regions.iter().map(|r| r.max_free_run).max().unwrap_or(0);

        let used = self.total_capacity - self.free_bytes;
        let usage_percentage = if self.total_capacity == 0 {
            0.0
        } else {
            (used as f64 / self.total_capacity as f64) * 100.0
        };

        HeapSnapshot {
            total: self.total_capacity,
            used,
            free: self.free_bytes,
            max_free_run,
            histogram,
            usage_percentage,
            pressure: MemoryPressure::from_usage(usage_percentage),
            emergency: self.emergency,
            locked: self.is_locked(),
            stats: self.stats.clone(),
            pressure_stats: self.pressure_stats.clone(),
            anomaly_count: self.anomaly_count(),
            recent_anomalies: self.recent_anomalies(),
            regions,
        }
    }

    /// Cross-check every counter against a full re-scan of the tiers
    ///
    /// Region tables are checked for orphan TAILs and free-block drift, then the
    /// global free-byte counter is compared with the scanned free bytes, and
    /// finally the live-byte statistic with `total - free`.
    pub fn validate(&self) -> HeapResult<()> {
        for region in &self.regions {
            region.check_invariants()?;
        }

        let external: usize = self.regions.iter().map(|r| r.scan_free_bytes()).sum();
        if let Some(internal) = self.internal.scan_free_bytes() {
            let scanned = internal + external;
            if scanned != self.free_bytes {
                return Err(HeapError::AccountingAnomaly {
                    counter: Counter::FreeBytes,
                    delta: scanned as i64 - self.free_bytes as i64,
                });
            }
        }

        let live = self.total_capacity - self.free_bytes;
        if self.stats.current_allocated != live {
            return Err(HeapError::AccountingAnomaly {
                counter: Counter::CurrentAllocated,
                delta: live as i64 - self.stats.current_allocated as i64,
            });
        }

        debug!(
            regions = self.regions.len(),
            free = self.free_bytes,
            "Heap validation passed"
        );
        Ok(())
    }
}

impl<I: InternalTier> HeapInfo for TieredHeap<I> {
    fn snapshot(&self) -> HeapSnapshot {
        TieredHeap::snapshot(self)
    }
}
