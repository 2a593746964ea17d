/*!
 * Allocation Policy Tests
 * The four verbs, reuse behavior, and source interaction
 */

use crate::support::{CountingSource, RecycleSource};
use pretty_assertions::assert_eq;
use treealloc::{
    Allocator, MemoryError, MemoryInspect, MemoryReclaim, TreeAllocator, NULL_ADDRESS,
};

#[test]
fn zero_size_allocation_yields_null_handle() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    assert_eq!(allocator.allocate(0).unwrap(), NULL_ADDRESS);
    assert_eq!(counters.reserves(), 0);
    assert!(allocator.snapshot().is_empty());

    // Releasing the null handle is the matching no-op.
    allocator.release(NULL_ADDRESS).unwrap();
}

#[test]
fn allocation_reserves_and_tracks() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(256).unwrap();
    assert_ne!(addr, NULL_ADDRESS);
    assert_eq!(counters.reserves(), 1);
    assert!(allocator.is_live(addr));
    assert_eq!(allocator.block_size(addr), Some(256));
}

#[test]
fn released_block_is_reused_before_the_source() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(100).unwrap();
    allocator.release(addr).unwrap();
    assert!(!allocator.is_live(addr));

    // A request that fits must come back to the released address without
    // touching the source again.
    let reused = allocator.allocate(64).unwrap();
    assert_eq!(reused, addr);
    assert_eq!(counters.reserves(), 1);
    assert!(allocator.is_live(addr));
}

#[test]
fn best_fit_chooses_minimum_waste_across_the_pool() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let a = allocator.allocate(10).unwrap();
    let b = allocator.allocate(20).unwrap();
    let c = allocator.allocate(15).unwrap();
    for addr in [a, b, c] {
        allocator.release(addr).unwrap();
    }

    let reused = allocator.allocate(12).unwrap();
    assert_eq!(reused, c, "size 15 wastes less than size 20");
    assert_eq!(counters.reserves(), 3);
}

#[test]
fn source_exhaustion_leaves_no_record_behind() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);
    counters.exhaust();

    assert_eq!(
        allocator.allocate(64),
        Err(MemoryError::SourceExhausted { requested: 64 })
    );
    assert!(allocator.snapshot().is_empty());
}

#[test]
fn release_of_untracked_address_reports_not_found() {
    let (source, _counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    assert_eq!(
        allocator.release(0xdead),
        Err(MemoryError::NotFound(0xdead))
    );
}

#[test]
fn double_release_reports_not_found() {
    let (source, _counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(32).unwrap();
    allocator.release(addr).unwrap();
    assert_eq!(allocator.release(addr), Err(MemoryError::NotFound(addr)));
}

#[test]
fn resize_shrink_keeps_the_address_and_skips_the_source() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(256).unwrap();
    let reserves_before = counters.reserves();

    let shrunk = allocator.resize(addr, 100).unwrap();
    assert_eq!(shrunk, addr);
    assert_eq!(allocator.block_size(addr), Some(100));
    assert_eq!(counters.reserves(), reserves_before);
    assert_eq!(counters.releases(), 0);
}

#[test]
fn regrow_within_the_reservation_stays_in_place() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(8192).unwrap();
    assert_eq!(allocator.resize(addr, 100).unwrap(), addr);

    // The reservation still covers 8192 bytes, so growing back inside it
    // never reaches the source.
    assert_eq!(allocator.resize(addr, 4096).unwrap(), addr);
    assert_eq!(allocator.block_size(addr), Some(4096));
    assert_eq!(counters.reserves(), 1);
    assert_eq!(counters.releases(), 0);
}

#[test]
fn shrunk_block_is_released_at_its_reserved_size() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(8192).unwrap();
    allocator.resize(addr, 100).unwrap();
    allocator.release(addr).unwrap();

    // The source mapped 8192 bytes; handing back the shrunk 100 would
    // leave the tail mapped forever.
    assert_eq!(allocator.trim(), 8192);
    assert_eq!(counters.releases(), 1);
    assert_eq!(counters.released_bytes(), 8192);
    allocator.validate();
}

#[test]
fn resize_to_zero_behaves_as_release() {
    let (source, _counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(64).unwrap();
    assert_eq!(allocator.resize(addr, 0).unwrap(), NULL_ADDRESS);
    assert!(!allocator.is_live(addr));
}

#[test]
fn resize_of_untracked_address_behaves_as_allocate() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.resize(NULL_ADDRESS, 128).unwrap();
    assert_ne!(addr, NULL_ADDRESS);
    assert!(allocator.is_live(addr));
    assert_eq!(counters.reserves(), 1);
}

#[test]
fn resize_grow_reuses_a_fitting_free_block_and_copies() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let small = allocator.allocate(64).unwrap();
    unsafe {
        for i in 0..64usize {
            *((small + i) as *mut u8) = i as u8;
        }
    }

    let big = allocator.allocate(256).unwrap();
    allocator.release(big).unwrap();

    let grown = allocator.resize(small, 128).unwrap();
    assert_eq!(grown, big, "the free 256 byte block fits the request");
    assert_eq!(counters.reserves(), 2, "no fresh reservation");

    // Contents moved, old block retained for reuse.
    unsafe {
        for i in 0..64usize {
            assert_eq!(*((grown + i) as *const u8), i as u8);
        }
    }
    assert!(!allocator.is_live(small));
    assert_eq!(allocator.block_size(small), Some(64));
    assert_eq!(allocator.block_size(grown), Some(128));
}

#[test]
fn resize_grow_falls_back_to_the_source() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(64).unwrap();
    unsafe {
        *(addr as *mut u8) = 0x5A;
    }

    let grown = allocator.resize(addr, 512).unwrap();
    assert_ne!(grown, addr);
    assert_eq!(counters.reserves(), 2);
    assert_eq!(counters.releases(), 1, "relocated region went back");

    unsafe {
        assert_eq!(*(grown as *const u8), 0x5A);
    }
    // The old address is dead, not retained.
    assert_eq!(allocator.block_size(addr), None);
    assert_eq!(allocator.block_size(grown), Some(512));
}

#[test]
fn relocation_tolerates_the_source_reissuing_the_old_address() {
    let allocator = TreeAllocator::with_source(RecycleSource::new());

    let addr = allocator.allocate(64).unwrap();
    let grown = allocator.resize(addr, 512).unwrap();
    assert_ne!(grown, addr);

    // The source hands the released region straight back. The index must
    // have stopped tracking it before the relocation released it.
    let next = allocator.allocate(64).unwrap();
    assert_eq!(next, addr);
    assert!(allocator.is_live(next));
    allocator.validate();
}

#[test]
fn failed_grow_leaves_the_original_block_valid() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(64).unwrap();
    counters.exhaust();

    assert_eq!(
        allocator.resize(addr, 1024),
        Err(MemoryError::SourceExhausted { requested: 1024 })
    );
    assert!(allocator.is_live(addr));
    assert_eq!(allocator.block_size(addr), Some(64));
}

#[test]
fn zeroed_allocation_clears_a_reused_block() {
    let (source, _counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let addr = allocator.allocate(128).unwrap();
    unsafe {
        for i in 0..128usize {
            *((addr + i) as *mut u8) = 0xFF;
        }
    }
    allocator.release(addr).unwrap();

    let zeroed = allocator.allocate_zeroed(16, 8).unwrap();
    assert_eq!(zeroed, addr, "the dirty block is the best fit");
    unsafe {
        for i in 0..128usize {
            assert_eq!(*((zeroed + i) as *const u8), 0);
        }
    }
}

#[test]
fn zeroed_allocation_detects_overflow_before_reserving() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    assert_eq!(
        allocator.allocate_zeroed(usize::MAX, 2),
        Err(MemoryError::SizeOverflow {
            count: usize::MAX,
            size: 2
        })
    );
    assert_eq!(counters.reserves(), 0);
}

#[test]
fn stats_split_live_and_reusable_bytes() {
    let (source, _counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let a = allocator.allocate(100).unwrap();
    let _b = allocator.allocate(50).unwrap();
    allocator.release(a).unwrap();

    let stats = allocator.stats();
    assert_eq!(stats.tracked_blocks, 2);
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.live_bytes, 50);
    assert_eq!(stats.reusable_bytes, 100);
}

#[test]
fn trim_returns_only_free_blocks_to_the_source() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let a = allocator.allocate(100).unwrap();
    let b = allocator.allocate(200).unwrap();
    allocator.release(a).unwrap();

    let released = allocator.trim();
    assert_eq!(released, 100);
    assert_eq!(counters.releases(), 1);
    assert_eq!(allocator.block_size(a), None);
    assert!(allocator.is_live(b));
    allocator.validate();
}

#[test]
fn cleanup_releases_everything_and_resets() {
    let (source, counters) = CountingSource::new();
    let allocator = TreeAllocator::with_source(source);

    let mut addrs = Vec::new();
    for size in [32, 64, 128] {
        addrs.push(allocator.allocate(size).unwrap());
    }
    // Shrinking must not shorten what cleanup hands back.
    allocator.resize(addrs[2], 16).unwrap();
    allocator.cleanup();

    assert_eq!(counters.releases(), 3);
    assert_eq!(counters.released_bytes(), 32 + 64 + 128);
    assert!(allocator.snapshot().is_empty());
    assert_eq!(allocator.stats().tracked_blocks, 0);
}
