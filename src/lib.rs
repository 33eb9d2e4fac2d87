/*!
 * Tiered Heap Library
 * Two-tier block allocator for an embedded heap with external RAM regions
 */

pub mod core;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use crate::core::*;
pub use memory::{
    BlockHeap, HeapInfo, HeapSnapshot, InternalTier, MemoryPressure, Region, SharedHeap, Tier,
    TieredHeap,
};
pub use monitoring::{init_tracing, span_operation, HeapSpan};
