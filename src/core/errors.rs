/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::{Address, BlockIndex, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Heap operation result
pub type HeapResult<T> = Result<T, HeapError>;

/// Running counters whose updates are guarded against underflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    FreeBytes,
    CurrentAllocated,
    FreeBlocks,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Counter::FreeBytes => write!(f, "free_bytes"),
            Counter::CurrentAllocated => write!(f, "current_allocated"),
            Counter::FreeBlocks => write!(f, "free_blocks"),
        }
    }
}

/// Heap errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum HeapError {
    #[error("Invalid allocation size: requested {requested} bytes, capacity {capacity} bytes")]
    #[diagnostic(
        code(heap::invalid_size),
        help("Requests must be non-zero and no larger than the biggest tier.")
    )]
    InvalidSize { requested: Size, capacity: Size },

    #[error("Out of memory: requested {requested} bytes, {free} bytes free")]
    #[diagnostic(
        code(heap::out_of_memory),
        help("No tier holds a free run this large. Free memory or run a collection.")
    )]
    OutOfMemory { requested: Size, free: Size },

    #[error("Invalid free of address 0x{0:x}")]
    #[diagnostic(
        code(heap::invalid_free),
        help("Only the start address of a live allocation may be freed, and only once.")
    )]
    InvalidFree(Address),

    #[error("Invalid heap address: 0x{0:x}")]
    #[diagnostic(code(heap::invalid_address))]
    InvalidAddress(Address),

    #[error("Accounting anomaly on {counter}: off by {delta} bytes")]
    #[diagnostic(
        code(heap::accounting_anomaly),
        help("A counter disagrees with the occupancy tables. Check for foreign frees.")
    )]
    AccountingAnomaly { counter: Counter, delta: i64 },

    #[error("Memory corruption detected in region '{region}' at block {block}")]
    #[diagnostic(code(heap::corruption))]
    CorruptionDetected { region: String, block: BlockIndex },

    #[error("Emergency reserve active: refused {requested} bytes ({free} free, reserve {reserve})")]
    #[diagnostic(
        code(heap::emergency_denied),
        help("Large allocations are refused until frees restore the reserve.")
    )]
    EmergencyDenied {
        requested: Size,
        free: Size,
        reserve: Size,
    },

    #[error("Heap is locked")]
    #[diagnostic(
        code(heap::locked),
        help("Allocation is forbidden while the heap lock is held or contended.")
    )]
    HeapLocked,

    #[error("Invalid region: {0}")]
    #[diagnostic(code(heap::invalid_region))]
    InvalidRegion(String),

    #[error("Region '{name}' [0x{base:x}, 0x{end:x}) overlaps an existing range")]
    #[diagnostic(code(heap::region_overlap))]
    RegionOverlap {
        name: String,
        base: Address,
        end: Address,
    },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(heap::config))]
    Config(String),
}

impl HeapError {
    /// Whether the failure is an exhaustion the caller may retry after freeing
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            HeapError::OutOfMemory { .. } | HeapError::EmergencyDenied { .. }
        )
    }
}
