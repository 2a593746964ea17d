/*!
 * Memory Module
 * Allocation policy, error taxonomy, and observer surface
 */

pub mod manager;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use manager::TreeAllocator;
pub use traits::*;
pub use types::*;
