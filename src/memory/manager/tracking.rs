/*!
 * Heap Accounting
 * Free-byte counter, statistics, emergency flag and anomaly log
 */

use super::TieredHeap;
use crate::core::errors::Counter;
use crate::core::limits::MAX_RECORDED_ANOMALIES;
use crate::core::types::{Address, Size};
use crate::memory::traits::InternalTier;
use crate::memory::types::Anomaly;
use std::collections::VecDeque;
use tracing::{info, warn};

/// Most recent anomalies plus a running total
#[derive(Debug, Default)]
pub(super) struct AnomalyLog {
    recent: VecDeque<Anomaly>,
    count: usize,
}

impl AnomalyLog {
    pub fn record(&mut self, anomaly: Anomaly) {
        warn!(?anomaly, total = self.count + 1, "Heap accounting anomaly");
        if self.recent.len() == MAX_RECORDED_ANOMALIES {
            self.recent.pop_front();
        }
        self.recent.push_back(anomaly);
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn recent(&self) -> Vec<Anomaly> {
        self.recent.iter().cloned().collect()
    }
}

impl<I: InternalTier> TieredHeap<I> {
    pub(super) fn record_allocation(&mut self, size: Size) {
        self.debit(size);
        self.stats.add_allocation(size);
        self.update_emergency();
    }

    pub(super) fn record_free(&mut self, size: Size, free_run: Size) {
        self.credit(size);
        if !self.stats.remove_allocation(size) {
            self.anomalies.record(Anomaly::CounterUnderflow {
                counter: Counter::CurrentAllocated,
                delta: size,
            });
        }
        self.stats.note_free_run(free_run);
        self.update_emergency();
    }

    /// Account an in-place resize from `old` to `new` bytes
    pub(super) fn apply_resize(&mut self, old: Size, new: Size) {
        if new > old {
            self.debit(new - old);
            self.stats.grow(new - old);
        } else if old > new {
            self.credit(old - new);
            if !self.stats.shrink(old - new) {
                self.anomalies.record(Anomaly::CounterUnderflow {
                    counter: Counter::CurrentAllocated,
                    delta: old - new,
                });
            }
        }
        self.update_emergency();
    }

    pub(super) fn record_invalid_free(&mut self, address: Address) {
        self.anomalies.record(Anomaly::InvalidFree { address });
    }

    fn debit(&mut self, bytes: Size) {
        if bytes > self.free_bytes {
            self.anomalies.record(Anomaly::CounterUnderflow {
                counter: Counter::FreeBytes,
                delta: bytes - self.free_bytes,
            });
            self.free_bytes = 0;
        } else {
            self.free_bytes -= bytes;
        }
    }

    fn credit(&mut self, bytes: Size) {
        let credited = self.free_bytes.saturating_add(bytes);
        if credited > self.total_capacity {
            self.anomalies.record(Anomaly::CounterOverflow {
                counter: Counter::FreeBytes,
                delta: credited - self.total_capacity,
            });
            self.free_bytes = self.total_capacity;
        } else {
            self.free_bytes = credited;
        }
    }

    /// Re-evaluate the emergency flag against the reserve
    pub(super) fn update_emergency(&mut self) {
        let below = self.free_bytes < self.policy.emergency_reserve;
        if below && !self.emergency {
            self.emergency = true;
            warn!(
                free = self.free_bytes,
                reserve = self.policy.emergency_reserve,
                "Heap entered emergency mode"
            );
        } else if !below && self.emergency {
            self.emergency = false;
            info!(
                free = self.free_bytes,
                reserve = self.policy.emergency_reserve,
                "Heap left emergency mode"
            );
        }
    }

    pub(super) fn recent_anomalies(&self) -> Vec<Anomaly> {
        self.anomalies.recent()
    }
}
