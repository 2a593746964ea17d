/*!
 * Memory Types
 * Common types for allocation tracking
 */

use crate::core::types::{Address, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The address is not tracked by the index. Recoverable; callers
    /// decide the fallback.
    #[error("address 0x{0:x} is not tracked")]
    NotFound(Address),

    /// Insert contract violation: the address is already present. This
    /// indicates a bug in the policy layer, not a caller error.
    #[error("address 0x{0:x} is already tracked")]
    DuplicateAddress(Address),

    /// The raw memory source could not satisfy a reservation.
    #[error("memory source exhausted: requested {requested} bytes")]
    SourceExhausted { requested: Size },

    /// A zeroed allocation's element count times element size overflows.
    #[error("zeroed allocation overflows: {count} elements of {size} bytes")]
    SizeOverflow { count: Size, size: Size },
}

/// One record as seen by an observer: address, user-visible size, the
/// length of the underlying reservation, free status, and its depth in
/// the index tree. Snapshots are taken in ascending address order under
/// the same exclusion as mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub address: Address,
    pub size: Size,
    pub reserved: Size,
    pub free: bool,
    pub depth: usize,
}

/// Aggregate allocation statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Records currently present in the index, live or reusable.
    pub tracked_blocks: usize,
    /// Records available for best-fit reuse.
    pub free_blocks: usize,
    /// Bytes handed to callers and not yet released.
    pub live_bytes: Size,
    /// Bytes held in free records awaiting reuse.
    pub reusable_bytes: Size,
}
