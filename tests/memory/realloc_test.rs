/*!
 * Realloc Tests
 * In-place resizing, moves across tiers and failure atomicity
 */

use pretty_assertions::assert_eq;
use tiered_heap::memory::{BlockHeap, Tier, TieredHeap};
use tiered_heap::{AllocFlags, HeapConfig, HeapError};

const INTERNAL: usize = 4 * 1024;
const EXTERNAL: usize = 64 * 1024;

fn heap() -> TieredHeap<BlockHeap> {
    TieredHeap::from_config(&HeapConfig::testing()).expect("testing layout is valid")
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_external_grow_without_move_fails_cleanly() {
    let mut heap = heap();
    let a = heap.allocate(1024, AllocFlags::NONE).unwrap();
    let _b = heap.allocate(1024, AllocFlags::NONE).unwrap();
    heap.write_bytes(a, &pattern(1024)).unwrap();
    let free_before = heap.free_bytes();

    assert!(matches!(
        heap.realloc(a, 2048, false),
        Err(HeapError::OutOfMemory { requested: 2048, .. })
    ));
    assert_eq!(heap.read_bytes(a, 1024).unwrap(), pattern(1024));
    assert_eq!(heap.size_of(a), Some(1024));
    assert_eq!(heap.free_bytes(), free_before);
}

#[test]
fn test_external_grow_with_move_copies_contents() {
    let mut heap = heap();
    let a = heap.allocate(1024, AllocFlags::NONE).unwrap();
    let _b = heap.allocate(1024, AllocFlags::NONE).unwrap();
    heap.write_bytes(a, &pattern(1024)).unwrap();

    let moved = heap.realloc(a, 2048, true).unwrap();
    assert_ne!(moved, a);
    assert_eq!(heap.read_bytes(moved, 1024).unwrap(), pattern(1024));
    assert_eq!(heap.size_of(a), None);
    assert_eq!(heap.size_of(moved), Some(2048));
    assert_eq!(heap.free_bytes(), INTERNAL + EXTERNAL - 1024 - 2048);
    // The move is booked as a fresh allocation plus a free of the old block
    assert_eq!(heap.stats().alloc_count, 3);
    assert_eq!(heap.stats().free_count, 1);
    assert!(heap.validate().is_ok());
}

#[test]
fn test_internal_resize_in_place() {
    let mut heap = heap();
    let a = heap.allocate(32, AllocFlags::NONE).unwrap();
    heap.write_bytes(a, b"abc").unwrap();

    assert_eq!(heap.realloc(a, 64, false).unwrap(), a);
    assert_eq!(heap.stats().current_allocated, 64);
    assert_eq!(heap.free_bytes(), INTERNAL + EXTERNAL - 64);

    assert_eq!(heap.realloc(a, 16, false).unwrap(), a);
    assert_eq!(heap.stats().current_allocated, 16);
    assert_eq!(heap.stats().alloc_count, 1);
    assert_eq!(heap.stats().free_count, 0);
    assert_eq!(heap.free_bytes(), INTERNAL + EXTERNAL - 16);
    assert_eq!(heap.read_bytes(a, 3).unwrap(), b"abc");
    assert!(heap.validate().is_ok());
}

#[test]
fn test_growing_internal_block_moves_external() {
    let mut heap = heap();
    let a = heap.allocate(100, AllocFlags::NONE).unwrap();
    let _neighbour = heap.allocate(16, AllocFlags::NONE).unwrap();
    heap.write_bytes(a, &pattern(100)).unwrap();

    let moved = heap.realloc(a, 2048, true).unwrap();
    assert_eq!(heap.region_of(moved), Some(Tier::External(0)));
    assert_eq!(heap.read_bytes(moved, 100).unwrap(), pattern(100));
    assert_eq!(heap.size_of(a), None);
    assert_eq!(heap.stats().current_allocated, 16 + 2048);
}

#[test]
fn test_failed_move_keeps_old_block() {
    let mut heap = heap();
    heap.allocate(EXTERNAL, AllocFlags::NONE).unwrap();
    let a = heap.allocate(16, AllocFlags::NONE).unwrap();
    heap.write_bytes(a, &[7u8; 16]).unwrap();
    let before = heap.snapshot();

    assert!(matches!(
        heap.realloc(a, 8192, true),
        Err(HeapError::OutOfMemory { requested: 8192, .. })
    ));
    assert_eq!(heap.size_of(a), Some(16));
    assert_eq!(heap.read_bytes(a, 16).unwrap(), vec![7u8; 16]);
    assert_eq!(heap.free_bytes(), before.free);
    assert_eq!(heap.stats(), &before.stats);
    assert_eq!(heap.pressure_stats().alloc_fail_full, 1);
    assert_eq!(heap.pressure_stats().alloc_fail_fast, 0);
}

#[test]
fn test_realloc_rejects_unknown_and_zero() {
    let mut heap = heap();
    let a = heap.allocate(64, AllocFlags::NONE).unwrap();

    assert_eq!(
        heap.realloc(0x5000_0000, 64, true),
        Err(HeapError::InvalidFree(0x5000_0000))
    );
    assert!(matches!(
        heap.realloc(a, 0, true),
        Err(HeapError::InvalidSize { requested: 0, .. })
    ));
    heap.lock();
    assert_eq!(heap.realloc(a, 128, true), Err(HeapError::HeapLocked));
    heap.unlock();
    assert_eq!(heap.size_of(a), Some(64));
}
