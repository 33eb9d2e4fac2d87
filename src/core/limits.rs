/*!
 * Heap Limits and Constants
 *
 * Centralized location for heap-wide limits, thresholds, and policy defaults.
 * Every value here is only a default: `HeapConfig` and `RegionConfig` carry
 * the values actually in force.
 */

// =============================================================================
// BLOCK GEOMETRY
// =============================================================================

/// Block size of external regions (32 bytes)
/// 8 MiB / 32 B = 262 144 blocks, 64 KiB of occupancy table at 2 bits per block
pub const EXTERNAL_BLOCK_SIZE: usize = 32;

/// Block size of the internal tier (16 bytes)
pub const INTERNAL_BLOCK_SIZE: usize = 16;

/// Run alignment for external allocations, in blocks
/// [PERF] 8 blocks of 32 B keep large buffers on 256-byte boundaries
pub const DEFAULT_ALIGN_BLOCKS: usize = 8;

/// Upper bound on blocks claimed by a single external allocation
pub const DEFAULT_MAX_BLOCKS_PER_ALLOC: usize = 64 * 1024;

/// Largest region accepted at registration (1 GiB)
/// Regions own simulated backing bytes, so this also caps host memory per region
pub const MAX_REGION_SIZE: usize = 1024 * 1024 * 1024;

// =============================================================================
// ROUTING AND RESERVE
// =============================================================================

/// Requests at or above this size try external regions first (32 KiB)
pub const LARGE_OBJECT_THRESHOLD: usize = 32 * 1024;

/// Free-byte floor that switches the heap into emergency mode (8 KiB)
pub const EMERGENCY_RESERVE: usize = 8 * 1024;

// =============================================================================
// BOARD LAYOUT (RA6M5 + OSPI RAM)
// =============================================================================

/// Start of the memory-mapped OSPI RAM window
pub const OSPI_BASE: usize = 0x6800_0000;

/// OSPI RAM size (8 MiB)
pub const OSPI_SIZE: usize = 8 * 1024 * 1024;

/// Start of the internal SRAM heap
pub const INTERNAL_BASE: usize = 0x2000_0000;

/// Internal SRAM heap size (256 KiB)
pub const INTERNAL_HEAP_SIZE: usize = 256 * 1024;

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// Usage percentage reported as medium pressure
pub const PRESSURE_MEDIUM_PERCENT: f64 = 60.0;

/// Usage percentage reported as high pressure
pub const PRESSURE_HIGH_PERCENT: f64 = 80.0;

/// Usage percentage reported as critical pressure
pub const PRESSURE_CRITICAL_PERCENT: f64 = 95.0;

/// Number of recent anomalies kept for snapshots
pub const MAX_RECORDED_ANOMALIES: usize = 16;

/// Number of power-of-two size classes in run histograms
/// Classes: 1, 2, 3-4, 5-8, 9-16, 17-32, 33-64, 65+ blocks
pub const SIZE_CLASSES: usize = 8;
