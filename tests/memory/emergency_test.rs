/*!
 * Emergency Mode Tests
 * Reserve tracking, emergency policies, heap lock and anomaly reporting
 */

use pretty_assertions::assert_eq;
use tiered_heap::memory::{Anomaly, BlockHeap, MemoryPressure, TieredHeap};
use tiered_heap::{AllocFlags, EmergencyPolicy, HeapConfig, HeapError};

const EXTERNAL: usize = 64 * 1024;

/// Heap with 496 free bytes left, under the 512-byte reserve
fn drained() -> (TieredHeap<BlockHeap>, usize) {
    let mut heap = TieredHeap::from_config(&HeapConfig::testing()).unwrap();
    heap.allocate(EXTERNAL, AllocFlags::NONE).unwrap();
    let mut internal = Vec::new();
    for _ in 0..3 {
        internal.push(heap.allocate(1008, AllocFlags::NONE).unwrap());
    }
    let last = heap.allocate(576, AllocFlags::NONE).unwrap();
    assert_eq!(heap.free_bytes(), 496);
    (heap, last)
}

#[test]
fn test_flag_follows_reserve() {
    let (mut heap, last) = drained();
    assert!(heap.is_emergency());

    heap.free(last).unwrap();
    assert_eq!(heap.free_bytes(), 496 + 576);
    assert!(!heap.is_emergency());
}

#[test]
fn test_shrinking_realloc_clears_flag() {
    let (mut heap, last) = drained();
    assert!(heap.is_emergency());

    assert_eq!(heap.realloc(last, 16, false), Ok(last));
    assert_eq!(heap.free_bytes(), 496 + 560);
    assert!(!heap.is_emergency());
}

#[test]
fn test_growing_in_place_sets_flag() {
    let mut heap = TieredHeap::from_config(&HeapConfig::testing()).unwrap();
    heap.allocate(EXTERNAL, AllocFlags::NONE).unwrap();
    for _ in 0..3 {
        heap.allocate(1008, AllocFlags::NONE).unwrap();
    }
    let address = heap.allocate(16, AllocFlags::NONE).unwrap();
    assert_eq!(heap.free_bytes(), 1056);
    assert!(!heap.is_emergency());

    // The run after the block is free, so the grow happens in place
    assert_eq!(heap.realloc(address, 576, false), Ok(address));
    assert_eq!(heap.free_bytes(), 496);
    assert!(heap.is_emergency());
    assert!(heap.snapshot().emergency);
}

#[test]
fn test_deny_large_fails_fast() {
    let (mut heap, _) = drained();
    assert_eq!(heap.policy().emergency_policy, EmergencyPolicy::DenyLarge);

    assert_eq!(
        heap.allocate(1024, AllocFlags::NONE),
        Err(HeapError::EmergencyDenied {
            requested: 1024,
            free: 496,
            reserve: 512,
        })
    );
    assert_eq!(heap.pressure_stats().alloc_fail_fast, 1);
    assert_eq!(heap.pressure_stats().alloc_fail_full, 0);

    // Small requests are still served from the reserve
    assert!(heap.allocate(64, AllocFlags::NONE).is_ok());
}

#[test]
fn test_permissive_policy_tries_every_tier() {
    let (mut heap, _) = drained();
    heap.set_emergency_policy(EmergencyPolicy::Permissive);

    assert!(matches!(
        heap.allocate(1024, AllocFlags::NONE),
        Err(HeapError::OutOfMemory { requested: 1024, .. })
    ));
    assert_eq!(heap.pressure_stats().alloc_fail_fast, 0);
    assert_eq!(heap.pressure_stats().alloc_fail_full, 1);
}

#[test]
fn test_snapshot_reports_pressure() {
    let (heap, _) = drained();
    let snapshot = heap.snapshot();
    assert!(snapshot.emergency);
    assert_eq!(snapshot.pressure, MemoryPressure::Critical);
    assert_eq!(snapshot.free, 496);
    assert_eq!(snapshot.used, snapshot.total - 496);
}

#[test]
fn test_heap_lock_blocks_mutation() {
    let mut heap = TieredHeap::from_config(&HeapConfig::testing()).unwrap();
    let address = heap.allocate(64, AllocFlags::NONE).unwrap();

    heap.lock();
    assert_eq!(heap.free(address), Err(HeapError::HeapLocked));
    assert!(heap.snapshot().locked);
    heap.unlock();

    heap.free(address).unwrap();
    assert!(!heap.snapshot().locked);
}

#[test]
fn test_anomalies_surface_in_snapshot() {
    let mut heap = TieredHeap::from_config(&HeapConfig::testing()).unwrap();
    let _ = heap.free(0x6000_0040);
    heap.unlock();

    let snapshot = heap.snapshot();
    assert_eq!(snapshot.anomaly_count, 2);
    assert_eq!(
        snapshot.recent_anomalies,
        vec![
            Anomaly::InvalidFree {
                address: 0x6000_0040
            },
            Anomaly::UnbalancedUnlock,
        ]
    );
    assert!(heap.validate().is_ok());
}
