/*!
 * Memory Types
 * Occupancy states, statistics and snapshot records shared by the heap layers
 */

use crate::core::errors::Counter;
use crate::core::limits::{
    PRESSURE_CRITICAL_PERCENT, PRESSURE_HIGH_PERCENT, PRESSURE_MEDIUM_PERCENT, SIZE_CLASSES,
};
use crate::core::types::{Address, Size};
use serde::{Deserialize, Serialize};

/// Occupancy tag of one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockState {
    Free,
    /// First block of a live run
    Head,
    /// Continuation block of a live run
    Tail,
}

/// Which tier an address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Internal,
    /// External region by registration index
    External(usize),
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Tier::Internal => write!(f, "internal"),
            Tier::External(id) => write!(f, "external#{}", id),
        }
    }
}

/// Cumulative allocation statistics of the delegation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationStats {
    pub alloc_count: usize,
    pub free_count: usize,
    pub total_allocated: Size,
    pub current_allocated: Size,
    /// Largest free run (bytes) observed right after a free
    pub max_free_block: Size,
}

impl AllocationStats {
    pub fn add_allocation(&mut self, size: Size) {
        self.alloc_count += 1;
        self.total_allocated += size;
        self.current_allocated += size;
    }

    /// Returns false when the release had to be clamped at zero
    pub fn remove_allocation(&mut self, size: Size) -> bool {
        self.free_count += 1;
        self.shrink(size)
    }

    pub fn grow(&mut self, delta: Size) {
        self.total_allocated += delta;
        self.current_allocated += delta;
    }

    /// Returns false when the shrink had to be clamped at zero
    pub fn shrink(&mut self, delta: Size) -> bool {
        if delta > self.current_allocated {
            self.current_allocated = 0;
            false
        } else {
            self.current_allocated -= delta;
            true
        }
    }

    pub fn note_free_run(&mut self, bytes: Size) {
        if bytes > self.max_free_block {
            self.max_free_block = bytes;
        }
    }
}

/// Allocation failures split by cause
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureStats {
    /// Refused up front by the emergency policy
    pub alloc_fail_fast: usize,
    /// Every candidate tier was tried and exhausted
    pub alloc_fail_full: usize,
}

/// Bookkeeping irregularities; recorded, never propagated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A release larger than the counter; clamped to zero
    CounterUnderflow { counter: Counter, delta: Size },
    /// A credit past total capacity; clamped to capacity
    CounterOverflow { counter: Counter, delta: Size },
    /// Free or resize of an address no tier owns as a live allocation
    InvalidFree { address: Address },
    /// `unlock` without a matching `lock`
    UnbalancedUnlock,
}

/// Live-run counts bucketed by power-of-two block counts
///
/// Classes: 1, 2, 3-4, 5-8, 9-16, 17-32, 33-64, 65+ blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeHistogram {
    pub counts: [usize; SIZE_CLASSES],
    /// Longest live run, in blocks
    pub max_block: usize,
}

impl SizeHistogram {
    pub fn class_of(blocks: usize) -> usize {
        let class = (usize::BITS - blocks.saturating_sub(1).leading_zeros()) as usize;
        class.min(SIZE_CLASSES - 1)
    }

    pub fn record(&mut self, blocks: usize) {
        if blocks == 0 {
            return;
        }
        self.counts[Self::class_of(blocks)] += 1;
        self.max_block = self.max_block.max(blocks);
    }

    pub fn merge(&mut self, other: &SizeHistogram) {
        for (count, extra) in self.counts.iter_mut().zip(other.counts.iter()) {
            *count += extra;
        }
        self.max_block = self.max_block.max(other.max_block);
    }

    pub fn num_1block(&self) -> usize {
        self.counts[0]
    }

    pub fn num_2block(&self) -> usize {
        self.counts[1]
    }

    pub fn live_runs(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    pub fn from_usage(usage_percentage: f64) -> Self {
        if usage_percentage >= PRESSURE_CRITICAL_PERCENT {
            MemoryPressure::Critical
        } else if usage_percentage >= PRESSURE_HIGH_PERCENT {
            MemoryPressure::High
        } else if usage_percentage >= PRESSURE_MEDIUM_PERCENT {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

impl std::fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Point-in-time view of one region, computed by scanning its table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub name: String,
    pub tier: Tier,
    pub base: Address,
    pub block_size: Size,
    pub block_count: usize,
    pub total: Size,
    pub used: Size,
    pub free: Size,
    /// Largest free run, in bytes
    pub max_free_run: Size,
    pub histogram: SizeHistogram,
}

/// Point-in-time view of the whole heap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapSnapshot {
    pub total: Size,
    pub used: Size,
    /// The running free-byte counter, not a re-scan
    pub free: Size,
    pub max_free_run: Size,
    pub histogram: SizeHistogram,
    pub usage_percentage: f64,
    pub pressure: MemoryPressure,
    pub emergency: bool,
    pub locked: bool,
    pub stats: AllocationStats,
    pub pressure_stats: PressureStats,
    pub anomaly_count: usize,
    pub recent_anomalies: Vec<Anomaly>,
    pub regions: Vec<RegionSnapshot>,
}
