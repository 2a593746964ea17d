/*!
 * Treealloc Library
 * Best-fit dynamic memory tracking over a B-tree block index
 */

pub mod core;
pub mod index;
pub mod memory;
pub mod source;

// Re-exports
pub use crate::core::types::{Address, Size, NULL_ADDRESS};
pub use index::{BlockIndex, BlockRecord};
pub use memory::{
    Allocator, BlockSnapshot, MemoryError, MemoryInspect, MemoryReclaim, MemoryResult,
    MemoryStats, TreeAllocator,
};
pub use source::{MemorySource, SystemSource};
