/*!
 * Heap Configuration
 *
 * Policy knobs and region layout, loadable from JSON and overridable from the
 * environment. Defaults come from `core::limits`.
 */

use super::errors::{HeapError, HeapResult};
use super::limits::*;
use super::types::{Address, Size};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Environment override for the large-object threshold (bytes)
pub const ENV_LARGE_THRESHOLD: &str = "HEAP_LARGE_THRESHOLD";

/// Environment override for the emergency reserve (bytes)
pub const ENV_EMERGENCY_RESERVE: &str = "HEAP_EMERGENCY_RESERVE";

/// Environment override for the emergency policy (`permissive` / `deny_large`)
pub const ENV_EMERGENCY_POLICY: &str = "HEAP_EMERGENCY_POLICY";

/// What the heap does while the emergency flag is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyPolicy {
    /// Keep routing as usual
    Permissive,
    /// Refuse large requests outright until the reserve is restored
    #[default]
    DenyLarge,
}

impl FromStr for EmergencyPolicy {
    type Err = HeapError;

    fn from_str(s: &str) -> HeapResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(EmergencyPolicy::Permissive),
            "deny_large" | "deny-large" => Ok(EmergencyPolicy::DenyLarge),
            other => Err(HeapError::Config(format!(
                "unknown emergency policy '{}'",
                other
            ))),
        }
    }
}

/// Routing and reserve policy of the delegation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapPolicy {
    /// Requests at or above this size try external regions first
    pub large_object_threshold: Size,
    /// Free-byte floor below which the emergency flag is set
    pub emergency_reserve: Size,
    pub emergency_policy: EmergencyPolicy,
}

impl Default for HeapPolicy {
    fn default() -> Self {
        Self {
            large_object_threshold: LARGE_OBJECT_THRESHOLD,
            emergency_reserve: EMERGENCY_RESERVE,
            emergency_policy: EmergencyPolicy::default(),
        }
    }
}

fn default_align_blocks() -> usize {
    DEFAULT_ALIGN_BLOCKS
}

fn default_max_blocks_per_alloc() -> usize {
    DEFAULT_MAX_BLOCKS_PER_ALLOC
}

/// Layout and placement policy of one external region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub base: Address,
    pub size: Size,
    pub block_size: Size,
    /// Runs are rounded up to a multiple of this many blocks
    #[serde(default = "default_align_blocks")]
    pub align_blocks: usize,
    /// Largest run a single allocation may claim
    #[serde(default = "default_max_blocks_per_alloc")]
    pub max_blocks_per_alloc: usize,
}

impl RegionConfig {
    pub fn new(name: impl Into<String>, base: Address, size: Size, block_size: Size) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            block_size,
            align_blocks: DEFAULT_ALIGN_BLOCKS,
            max_blocks_per_alloc: DEFAULT_MAX_BLOCKS_PER_ALLOC,
        }
    }

    pub fn with_align_blocks(mut self, align_blocks: usize) -> Self {
        self.align_blocks = align_blocks;
        self
    }

    pub fn with_max_blocks_per_alloc(mut self, max_blocks: usize) -> Self {
        self.max_blocks_per_alloc = max_blocks;
        self
    }

    /// Blocks tracked by the region; a trailing partial block is not used
    pub fn block_count(&self) -> usize {
        if self.block_size == 0 {
            0
        } else {
            self.size / self.block_size
        }
    }

    pub fn validate(&self) -> HeapResult<()> {
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(HeapError::InvalidRegion(format!(
                "{}: block size {} is not a power of two",
                self.name, self.block_size
            )));
        }
        if self.size > MAX_REGION_SIZE {
            return Err(HeapError::InvalidRegion(format!(
                "{}: size {} exceeds the {}-byte region limit",
                self.name, self.size, MAX_REGION_SIZE
            )));
        }
        if self.block_count() == 0 {
            return Err(HeapError::InvalidRegion(format!(
                "{}: size {} holds no {}-byte block",
                self.name, self.size, self.block_size
            )));
        }
        if self.align_blocks == 0 || !self.align_blocks.is_power_of_two() {
            return Err(HeapError::InvalidRegion(format!(
                "{}: alignment of {} blocks is not a power of two",
                self.name, self.align_blocks
            )));
        }
        if self.max_blocks_per_alloc == 0 {
            return Err(HeapError::InvalidRegion(format!(
                "{}: per-allocation cap must be at least one block",
                self.name
            )));
        }
        if self.base.checked_add(self.size).is_none() {
            return Err(HeapError::InvalidRegion(format!(
                "{}: range starting at 0x{:x} wraps the address space",
                self.name, self.base
            )));
        }
        Ok(())
    }
}

/// Layout of the reference internal tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalConfig {
    pub base: Address,
    pub size: Size,
    pub block_size: Size,
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            base: INTERNAL_BASE,
            size: INTERNAL_HEAP_SIZE,
            block_size: INTERNAL_BLOCK_SIZE,
        }
    }
}

impl InternalConfig {
    /// The internal tier as an unaligned, uncapped region
    pub fn region(&self) -> RegionConfig {
        let config = RegionConfig::new("internal", self.base, self.size, self.block_size)
            .with_align_blocks(1);
        let blocks = config.block_count().max(1);
        config.with_max_blocks_per_alloc(blocks)
    }
}

/// Complete heap configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeapConfig {
    #[serde(default)]
    pub policy: HeapPolicy,
    #[serde(default)]
    pub internal: InternalConfig,
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
}

impl HeapConfig {
    /// RA6M5 board: internal SRAM heap plus 8 MiB of OSPI RAM
    pub fn embedded() -> Self {
        Self {
            policy: HeapPolicy::default(),
            internal: InternalConfig::default(),
            regions: vec![RegionConfig::new(
                "ospi",
                OSPI_BASE,
                OSPI_SIZE,
                EXTERNAL_BLOCK_SIZE,
            )],
        }
    }

    /// Small layout for tests: 4 KiB internal tier, 64 KiB external region
    pub fn testing() -> Self {
        Self {
            policy: HeapPolicy {
                large_object_threshold: 1024,
                emergency_reserve: 512,
                emergency_policy: EmergencyPolicy::DenyLarge,
            },
            internal: InternalConfig {
                base: 0x1000_0000,
                size: 4 * 1024,
                block_size: INTERNAL_BLOCK_SIZE,
            },
            regions: vec![RegionConfig::new(
                "external",
                0x6000_0000,
                64 * 1024,
                EXTERNAL_BLOCK_SIZE,
            )],
        }
    }

    pub fn with_policy(mut self, policy: HeapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_region(mut self, region: RegionConfig) -> Self {
        self.regions.push(region);
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> HeapResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| HeapError::Config(format!("invalid heap configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> HeapResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| HeapError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Apply `HEAP_*` environment overrides on top of this configuration
    pub fn with_env_overrides(mut self) -> HeapResult<Self> {
        if let Some(threshold) = env_size(ENV_LARGE_THRESHOLD)? {
            self.policy.large_object_threshold = threshold;
        }
        if let Some(reserve) = env_size(ENV_EMERGENCY_RESERVE)? {
            self.policy.emergency_reserve = reserve;
        }
        if let Ok(policy) = std::env::var(ENV_EMERGENCY_POLICY) {
            self.policy.emergency_policy = policy.parse()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> HeapResult<()> {
        self.internal.region().validate()?;
        for region in &self.regions {
            region.validate()?;
        }
        Ok(())
    }
}

fn env_size(key: &str) -> HeapResult<Option<Size>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<Size>()
            .map(Some)
            .map_err(|e| HeapError::Config(format!("{}='{}': {}", key, value, e))),
        Err(_) => Ok(None),
    }
}
