/*!
 * Block Index
 *
 * Balanced multi-way search tree (B-tree) of allocation records, keyed by
 * block address. Each record carries the block's size and free/in-use
 * status; the tree owns all structural maintenance (node splitting,
 * sibling borrowing, node merging, root collapse) and the best-fit scan
 * that drives block reuse.
 *
 * ## Invariants
 *
 * - Every node except the root holds between `t-1` and `2t-1` records,
 *   where `t` is the minimum degree fixed at construction.
 * - All leaves appear at the same depth.
 * - Records are strictly ordered by address within a node and across
 *   subtrees; addresses are unique, so ties cannot occur.
 * - The root may hold fewer than `t-1` records and is absent only when
 *   the tree is empty.
 *
 * ## Best-fit lookups
 *
 * The tree is keyed by address for O(log n) exact-match operations, but
 * best-fit searches by size, so they walk the whole tree. A secondary
 * size-ordered structure over free records would make best-fit
 * logarithmic; that is an extension point, not current behavior.
 */

mod node;
mod tree;

pub use node::BlockRecord;
pub use tree::BlockIndex;

/// Default minimum degree of the tree.
pub const DEFAULT_MIN_DEGREE: usize = 2;
