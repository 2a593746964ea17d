/*!
 * Memory Traits
 * Allocation and inspection abstractions
 */

use super::types::*;
use crate::core::types::{Address, Size};

/// The four allocation verbs.
pub trait Allocator: Send + Sync {
    /// Allocate `size` bytes, reusing a tracked free block when one fits.
    /// A zero-size request yields [`crate::core::types::NULL_ADDRESS`].
    fn allocate(&self, size: Size) -> MemoryResult<Address>;

    /// Resize an allocation, possibly relocating it. An absent or null
    /// address behaves as `allocate`; a zero `new_size` behaves as
    /// `release` and yields the null handle.
    fn resize(&self, address: Address, new_size: Size) -> MemoryResult<Address>;

    /// Allocate `count * size` bytes, zero-filled. Overflow of the total
    /// is reported before any reservation is attempted.
    fn allocate_zeroed(&self, count: Size, size: Size) -> MemoryResult<Address>;

    /// Return a block to the reuse pool. No-op on the null handle.
    fn release(&self, address: Address) -> MemoryResult<()>;
}

/// Read-only inspection of the block index.
pub trait MemoryInspect: Send + Sync {
    /// Every tracked record in address order with its tree depth.
    fn snapshot(&self) -> Vec<BlockSnapshot>;

    /// Aggregate counters.
    fn stats(&self) -> MemoryStats;

    /// Whether an address is tracked and currently in use.
    fn is_live(&self, address: Address) -> bool;

    /// Stored size of a tracked block, live or free.
    fn block_size(&self, address: Address) -> Option<Size>;
}

/// Returning tracked memory to the raw source.
pub trait MemoryReclaim: Send + Sync {
    /// Purge every free record and hand its region back to the source.
    /// Returns the number of bytes released.
    fn trim(&self) -> Size;

    /// Release everything the index tracks and reset it to empty.
    /// Shutdown path.
    fn cleanup(&self);
}
