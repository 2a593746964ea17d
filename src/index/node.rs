/*!
 * Index Nodes
 * Tree node and allocation record types
 */

use crate::core::types::{Address, Size};

/// One tracked allocation: its address, user-visible size, the length of
/// the underlying reservation, and whether it is currently available for
/// reuse. Identity is the address; two records never share an address
/// while both are present in the index.
///
/// `size` shrinks and regrows with the caller's requests, but `reserved`
/// stays the length the memory source handed out. Every region returned
/// to the source must be returned at its reserved length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub address: Address,
    pub size: Size,
    pub reserved: Size,
    pub free: bool,
}

impl BlockRecord {
    /// A freshly registered record is always in use and covers its whole
    /// reservation.
    pub fn new(address: Address, size: Size) -> Self {
        Self {
            address,
            size,
            reserved: size,
            free: false,
        }
    }
}

/// One tree node: an ordered run of records plus, for internal nodes,
/// `records.len() + 1` exclusively owned children. Leaves own no children,
/// so `children.is_empty()` is the leaf test.
#[derive(Debug)]
pub(super) struct Node {
    pub records: Vec<BlockRecord>,
    pub children: Vec<Box<Node>>,
}

impl Node {
    pub fn new_leaf(t: usize) -> Self {
        Self {
            records: Vec::with_capacity(2 * t - 1),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_full(&self, t: usize) -> bool {
        self.records.len() == 2 * t - 1
    }

    /// Position of `address` in this node, or the child slot that could
    /// contain it.
    pub fn search(&self, address: Address) -> Result<usize, usize> {
        self.records.binary_search_by_key(&address, |r| r.address)
    }
}
