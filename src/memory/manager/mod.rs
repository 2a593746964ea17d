/*!
 * Tree Allocator
 *
 * Allocation policy over the shared block index. The index sits behind a
 * single mutex (the concurrency guard): every allocation verb and every
 * observer read acquires it for the duration of one index operation, so
 * structural changes are never observed half-complete. The raw memory
 * source has its own lock, and the two are never held together.
 */

mod policy;
mod reclaim;

use crate::core::types::{Address, Size};
use crate::index::BlockIndex;
use crate::memory::traits::{Allocator, MemoryInspect, MemoryReclaim};
use crate::memory::types::{BlockSnapshot, MemoryResult, MemoryStats};
use crate::source::{MemorySource, SystemSource};
use parking_lot::Mutex;
use std::sync::Arc;

/// Best-fit allocator tracking every live block in a B-tree index.
///
/// Release retains blocks for reuse (`free = true`) rather than returning
/// them to the source; that pool is what best-fit searches. Memory goes
/// back to the source only through [`MemoryReclaim::trim`] and
/// [`MemoryReclaim::cleanup`].
pub struct TreeAllocator<S: MemorySource = SystemSource> {
    index: Arc<Mutex<BlockIndex>>,
    source: Arc<Mutex<S>>,
}

impl TreeAllocator<SystemSource> {
    pub fn new() -> Self {
        Self::with_source(SystemSource::new())
    }

    /// Create an allocator whose index uses a custom minimum degree.
    pub fn with_degree(t: usize) -> Self {
        Self {
            index: Arc::new(Mutex::new(BlockIndex::with_degree(t))),
            source: Arc::new(Mutex::new(SystemSource::new())),
        }
    }
}

impl<S: MemorySource> TreeAllocator<S> {
    /// Create an allocator over an injected memory source (testing and
    /// embedding).
    pub fn with_source(source: S) -> Self {
        Self {
            index: Arc::new(Mutex::new(BlockIndex::new())),
            source: Arc::new(Mutex::new(source)),
        }
    }

    pub(super) fn index(&self) -> &Mutex<BlockIndex> {
        &self.index
    }

    pub(super) fn guarded_source(&self) -> &Mutex<S> {
        &self.source
    }

    /// Check every index invariant under the guard. Debug aid; panics on
    /// violation.
    pub fn validate(&self) {
        self.index.lock().validate();
    }
}

impl<S: MemorySource> MemoryInspect for TreeAllocator<S> {
    fn snapshot(&self) -> Vec<BlockSnapshot> {
        self.index.lock().snapshot()
    }

    fn stats(&self) -> MemoryStats {
        let snapshot = self.index.lock().snapshot();
        let mut stats = MemoryStats {
            tracked_blocks: snapshot.len(),
            free_blocks: 0,
            live_bytes: 0,
            reusable_bytes: 0,
        };
        for block in &snapshot {
            if block.free {
                stats.free_blocks += 1;
                stats.reusable_bytes += block.size;
            } else {
                stats.live_bytes += block.size;
            }
        }
        stats
    }

    fn is_live(&self, address: Address) -> bool {
        self.index
            .lock()
            .locate(address)
            .map_or(false, |record| !record.free)
    }

    fn block_size(&self, address: Address) -> Option<Size> {
        self.index.lock().locate(address).map(|record| record.size)
    }
}

// Implement trait interfaces by delegation to the inherent verbs.
impl<S: MemorySource> Allocator for TreeAllocator<S> {
    fn allocate(&self, size: Size) -> MemoryResult<Address> {
        TreeAllocator::allocate(self, size)
    }

    fn resize(&self, address: Address, new_size: Size) -> MemoryResult<Address> {
        TreeAllocator::resize(self, address, new_size)
    }

    fn allocate_zeroed(&self, count: Size, size: Size) -> MemoryResult<Address> {
        TreeAllocator::allocate_zeroed(self, count, size)
    }

    fn release(&self, address: Address) -> MemoryResult<()> {
        TreeAllocator::release(self, address)
    }
}

impl<S: MemorySource> MemoryReclaim for TreeAllocator<S> {
    fn trim(&self) -> Size {
        TreeAllocator::trim(self)
    }

    fn cleanup(&self) {
        TreeAllocator::cleanup(self)
    }
}

impl<S: MemorySource> Clone for TreeAllocator<S> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            source: Arc::clone(&self.source),
        }
    }
}

impl Default for TreeAllocator<SystemSource> {
    fn default() -> Self {
        Self::new()
    }
}
