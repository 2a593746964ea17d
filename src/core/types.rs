/*!
 * Core Types
 * Common types used across the crate
 */

/// Address type for tracked memory regions. Addresses are opaque handles
/// handed out by the raw memory source; they are unique while the region
/// is live.
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// The null handle. Zero-size requests yield it and `release` ignores it.
pub const NULL_ADDRESS: Address = 0;
