/*!
 * Memory Module
 * Block regions, the internal tier and the tiered delegation layer
 */

pub mod internal;
pub mod manager;
pub mod region;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use internal::BlockHeap;
pub use manager::{SharedHeap, TieredHeap};
pub use region::{AllocTable, Region};
pub use traits::*;
pub use types::*;
