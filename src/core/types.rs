/*!
 * Core Types
 * Common types used across the heap
 */

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Address type for heap operations
pub type Address = usize;

/// Size type for heap operations
pub type Size = usize;

/// Index of a block within one region
pub type BlockIndex = usize;

/// Allocation flags forwarded untouched to the internal tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocFlags(u32);

impl AllocFlags {
    pub const NONE: Self = Self(0);

    /// The object carries a finaliser the collector runs on sweep
    pub const HAS_FINALISER: Self = Self(1);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AllocFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
