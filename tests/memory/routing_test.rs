/*!
 * Routing Tests
 * Size-based tier selection, fallback and exhaustion of the tiered heap
 */

use pretty_assertions::assert_eq;
use tiered_heap::memory::{BlockHeap, Tier, TieredHeap};
use tiered_heap::{AllocFlags, HeapConfig, HeapError, RegionConfig};

const INTERNAL: usize = 4 * 1024;
const EXTERNAL: usize = 64 * 1024;

fn heap() -> TieredHeap<BlockHeap> {
    TieredHeap::from_config(&HeapConfig::testing()).expect("testing layout is valid")
}

#[test]
fn test_threshold_selects_tier() {
    let mut heap = heap();
    let small = heap.allocate(1023, AllocFlags::NONE).unwrap();
    let large = heap.allocate(1024, AllocFlags::NONE).unwrap();

    assert_eq!(heap.region_of(small), Some(Tier::Internal));
    assert_eq!(heap.region_of(large), Some(Tier::External(0)));
    assert_eq!(heap.free_bytes(), INTERNAL + EXTERNAL - 1024 - 1024);
}

#[test]
fn test_regions_tried_in_registration_order() {
    let mut heap = heap();
    heap.register_region(&RegionConfig::new("sdram", 0x7000_0000, 16 * 1024, 32))
        .unwrap();

    let fill = heap.allocate(EXTERNAL, AllocFlags::NONE).unwrap();
    assert_eq!(heap.region_of(fill), Some(Tier::External(0)));

    let next = heap.allocate(2048, AllocFlags::NONE).unwrap();
    assert_eq!(next, 0x7000_0000);
    assert_eq!(heap.region_of(next), Some(Tier::External(1)));
}

#[test]
fn test_large_request_falls_back_to_internal() {
    let mut heap = heap();
    heap.allocate(EXTERNAL, AllocFlags::NONE).unwrap();

    let address = heap.allocate(1024, AllocFlags::NONE).unwrap();
    assert_eq!(heap.region_of(address), Some(Tier::Internal));
    assert_eq!(heap.size_of(address), Some(1024));
}

#[test]
fn test_small_requests_never_spill_external() {
    let mut heap = heap();
    for _ in 0..4 {
        heap.allocate(1008, AllocFlags::NONE).unwrap();
    }

    assert_eq!(
        heap.allocate(80, AllocFlags::NONE),
        Err(HeapError::OutOfMemory {
            requested: 80,
            free: EXTERNAL + 64,
        })
    );
    assert_eq!(heap.pressure_stats().alloc_fail_full, 1);
    assert_eq!(heap.region(0).unwrap().free_bytes(), EXTERNAL);
}

#[test]
fn test_both_tiers_exhausted() {
    let mut heap = heap();
    heap.allocate(EXTERNAL, AllocFlags::NONE).unwrap();
    heap.allocate(INTERNAL, AllocFlags::NONE).unwrap();
    assert_eq!(heap.free_bytes(), 0);

    assert_eq!(
        heap.allocate(16, AllocFlags::NONE),
        Err(HeapError::OutOfMemory {
            requested: 16,
            free: 0,
        })
    );
    assert_eq!(heap.pressure_stats().alloc_fail_full, 1);
    assert!(heap.validate().is_ok());
}

#[test]
fn test_invalid_sizes_leave_heap_untouched() {
    let mut heap = heap();
    let before = heap.snapshot();

    assert_eq!(
        heap.allocate(0, AllocFlags::NONE),
        Err(HeapError::InvalidSize {
            requested: 0,
            capacity: EXTERNAL,
        })
    );
    assert_eq!(
        heap.allocate(EXTERNAL + 1, AllocFlags::NONE),
        Err(HeapError::InvalidSize {
            requested: EXTERNAL + 1,
            capacity: EXTERNAL,
        })
    );

    let after = heap.snapshot();
    assert_eq!(after.free, before.free);
    assert_eq!(after.stats, before.stats);
    assert_eq!(after.regions, before.regions);
}

#[test]
fn test_external_free_tracks_largest_run() {
    let mut heap = heap();
    let a = heap.allocate(2048, AllocFlags::NONE).unwrap();
    let b = heap.allocate(2048, AllocFlags::NONE).unwrap();

    heap.free(a).unwrap();
    assert_eq!(heap.stats().max_free_block, 2048);
    heap.free(b).unwrap();
    assert_eq!(heap.stats().max_free_block, EXTERNAL);
    assert_eq!(heap.free_bytes(), INTERNAL + EXTERNAL);
}

#[test]
fn test_interior_pointer_free_is_rejected() {
    let mut heap = heap();
    let address = heap.allocate(4096, AllocFlags::NONE).unwrap();
    let before = heap.free_bytes();

    assert_eq!(
        heap.free(address + 32),
        Err(HeapError::InvalidFree(address + 32))
    );
    assert_eq!(heap.free_bytes(), before);
    heap.free(address).unwrap();
    assert_eq!(heap.free(address), Err(HeapError::InvalidFree(address)));
    assert_eq!(heap.anomaly_count(), 2);
}
