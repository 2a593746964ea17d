/*!
 * Block Index Tree
 * B-tree operations: insert, locate, best-fit, mark-free, remove
 */

use super::node::{BlockRecord, Node};
use super::DEFAULT_MIN_DEGREE;
use crate::core::types::{Address, Size};
use crate::memory::types::{BlockSnapshot, MemoryError, MemoryResult};

/// Balanced index of allocation records keyed by address.
///
/// The root is owned by this value; callers that need to share one index
/// across threads wrap it in a lock (see `TreeAllocator`). Structural
/// repairs (split, borrow, merge, root collapse) happen top-down, so every
/// node entered during a mutation already satisfies the occupancy bounds
/// the operation needs.
#[derive(Debug)]
pub struct BlockIndex {
    root: Option<Box<Node>>,
    t: usize,
    len: usize,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::with_degree(DEFAULT_MIN_DEGREE)
    }

    /// Create an index with a custom minimum degree.
    ///
    /// # Panics
    ///
    /// Panics if `t < 2`; degree 1 nodes cannot hold a separator record.
    pub fn with_degree(t: usize) -> Self {
        assert!(t >= 2, "minimum degree must be at least 2");
        Self {
            root: None,
            t,
            len: 0,
        }
    }

    pub fn min_degree(&self) -> usize {
        self.t
    }

    /// Number of records currently tracked.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register a new, in-use record.
    ///
    /// A full root is split first (the tree grows by one level); the
    /// descent then splits any full child before entering it, so the
    /// insertion point is always a non-full leaf.
    pub fn insert(&mut self, address: Address, size: Size) -> MemoryResult<()> {
        self.insert_record(BlockRecord::new(address, size))
    }

    /// Register a record carried over intact, shrunk size and reservation
    /// included. Used when an operation has to put a removed record back.
    pub fn insert_record(&mut self, record: BlockRecord) -> MemoryResult<()> {
        let address = record.address;
        if self.locate(address).is_some() {
            return Err(MemoryError::DuplicateAddress(address));
        }

        match self.root.take() {
            None => {
                let mut root = Node::new_leaf(self.t);
                root.records.push(record);
                self.root = Some(Box::new(root));
            }
            Some(mut root) => {
                if root.is_full(self.t) {
                    let mut new_root = Node::new_leaf(self.t);
                    new_root.children.push(root);
                    split_child(&mut new_root, 0, self.t);
                    let mut new_root = Box::new(new_root);
                    insert_non_full(&mut new_root, record, self.t);
                    self.root = Some(new_root);
                } else {
                    insert_non_full(&mut root, record, self.t);
                    self.root = Some(root);
                }
            }
        }
        self.len += 1;
        Ok(())
    }

    /// Exact-match lookup by address. Returns a copy of the record.
    pub fn locate(&self, address: Address) -> Option<BlockRecord> {
        let mut node = self.root.as_deref()?;
        loop {
            match node.search(address) {
                Ok(i) => return Some(node.records[i]),
                Err(i) => {
                    if node.is_leaf() {
                        return None;
                    }
                    node = &node.children[i];
                }
            }
        }
    }

    fn locate_mut(&mut self, address: Address) -> Option<&mut BlockRecord> {
        let mut node = self.root.as_deref_mut()?;
        loop {
            match node.search(address) {
                Ok(i) => return Some(&mut node.records[i]),
                Err(i) => {
                    if node.is_leaf() {
                        return None;
                    }
                    node = &mut node.children[i];
                }
            }
        }
    }

    /// Mark a record as available for reuse. No structural change. The
    /// record's size springs back to its reservation: the whole region is
    /// up for grabs again, whatever the caller had shrunk it to.
    pub fn mark_free(&mut self, address: Address) -> MemoryResult<()> {
        match self.locate_mut(address) {
            Some(record) => {
                record.free = true;
                record.size = record.reserved;
                Ok(())
            }
            None => Err(MemoryError::NotFound(address)),
        }
    }

    /// Update the user-visible size of a record in place. The reservation
    /// is untouched; `new_size` must fit inside it.
    pub fn resize_record(&mut self, address: Address, new_size: Size) -> MemoryResult<()> {
        match self.locate_mut(address) {
            Some(record) => {
                debug_assert!(new_size <= record.reserved);
                record.size = new_size;
                Ok(())
            }
            None => Err(MemoryError::NotFound(address)),
        }
    }

    /// Find the free record with the smallest size still satisfying
    /// `size`, mark it in use at that size, and return its address.
    ///
    /// Size is not the sort key, so this walks the whole tree in order;
    /// ties go to the first record encountered, and an exact fit stops the
    /// scan early.
    pub fn find_best_fit(&mut self, size: Size) -> Option<Address> {
        let mut best: Option<BlockRecord> = None;
        best_fit_scan(self.root.as_deref()?, size, &mut best);

        let address = best?.address;
        if let Some(record) = self.locate_mut(address) {
            record.free = false;
            record.size = size;
        }
        Some(address)
    }

    /// Fully delete a record and return it.
    ///
    /// Classic top-down B-tree deletion: records found in a leaf are
    /// excised; records found in an internal node are replaced by their
    /// in-order predecessor or successor, which is then deleted from the
    /// subtree it came from. Any `t-1` child on the descent path is
    /// repaired first by borrowing from a sibling or merging, so every
    /// node entered holds at least `t` records. An emptied root collapses
    /// to its sole child.
    pub fn remove(&mut self, address: Address) -> MemoryResult<BlockRecord> {
        if self.locate(address).is_none() {
            return Err(MemoryError::NotFound(address));
        }

        let root = self.root.as_mut().unwrap_or_else(|| unreachable!());
        let removed = remove_from(root, address, self.t);

        if root.records.is_empty() {
            let old_root = self.root.take().unwrap_or_else(|| unreachable!());
            self.root = if old_root.is_leaf() {
                None
            } else {
                old_root.children.into_iter().next()
            };
        }

        self.len -= 1;
        Ok(removed)
    }

    /// Remove every record and hand them back, resetting the tree to
    /// empty. Shutdown path: the caller is responsible for returning the
    /// underlying regions to the memory source.
    pub fn drain_records(&mut self) -> Vec<BlockRecord> {
        let records = self
            .snapshot()
            .into_iter()
            .map(|s| BlockRecord {
                address: s.address,
                size: s.size,
                reserved: s.reserved,
                free: s.free,
            })
            .collect();
        self.root = None;
        self.len = 0;
        records
    }

    /// Read-only traversal for observers: every record in ascending
    /// address order, tagged with its depth in the tree.
    pub fn snapshot(&self) -> Vec<BlockSnapshot> {
        let mut out = Vec::with_capacity(self.len);
        if let Some(root) = self.root.as_deref() {
            collect_in_order(root, 0, &mut out);
        }
        out
    }

    /// Check every structural invariant, panicking on the first violation.
    ///
    /// Debugging and test aid; violations indicate a defect in the index
    /// itself, never a caller error.
    pub fn validate(&self) {
        let Some(root) = self.root.as_deref() else {
            assert_eq!(self.len, 0, "empty tree with nonzero record count");
            return;
        };

        assert!(!root.records.is_empty(), "non-empty tree with empty root");
        let mut count = 0;
        check_node(root, self.t, true, None, None, &mut count);
        assert_eq!(count, self.len, "record count out of sync with tree");
    }
}

impl Default for BlockIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Split the full child at `idx`, promoting its median record into
/// `parent`. `parent` must not be full.
fn split_child(parent: &mut Node, idx: usize, t: usize) {
    let child = &mut parent.children[idx];
    debug_assert!(child.is_full(t), "splitting a non-full child");

    let right_records = child.records.split_off(t);
    let right_children = if child.is_leaf() {
        Vec::new()
    } else {
        child.children.split_off(t)
    };
    let median = child
        .records
        .pop()
        .unwrap_or_else(|| unreachable!("full node has a median"));

    let right = Node {
        records: right_records,
        children: right_children,
    };
    parent.records.insert(idx, median);
    parent.children.insert(idx + 1, Box::new(right));
}

fn insert_non_full(node: &mut Node, record: BlockRecord, t: usize) {
    debug_assert!(!node.is_full(t));
    match node.search(record.address) {
        Ok(_) => unreachable!("duplicate address checked before descent"),
        Err(pos) => {
            if node.is_leaf() {
                node.records.insert(pos, record);
            } else {
                let mut idx = pos;
                if node.children[idx].is_full(t) {
                    split_child(node, idx, t);
                    if record.address > node.records[idx].address {
                        idx += 1;
                    }
                }
                insert_non_full(&mut node.children[idx], record, t);
            }
        }
    }
}

/// In-order scan tracking the free record with the least waste. Returns
/// true once an exact fit is found, stopping the traversal.
fn best_fit_scan(node: &Node, size: Size, best: &mut Option<BlockRecord>) -> bool {
    for i in 0..=node.records.len() {
        if !node.is_leaf() && best_fit_scan(&node.children[i], size, best) {
            return true;
        }
        if i < node.records.len() {
            let record = &node.records[i];
            if record.free && record.size >= size {
                let better = match best {
                    None => true,
                    Some(current) => record.size < current.size,
                };
                if better {
                    *best = Some(*record);
                    if record.size == size {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn collect_in_order(node: &Node, depth: usize, out: &mut Vec<BlockSnapshot>) {
    for i in 0..=node.records.len() {
        if !node.is_leaf() {
            collect_in_order(&node.children[i], depth + 1, out);
        }
        if i < node.records.len() {
            let record = &node.records[i];
            out.push(BlockSnapshot {
                address: record.address,
                size: record.size,
                reserved: record.reserved,
                free: record.free,
                depth,
            });
        }
    }
}

/// Delete `address` from the subtree rooted at `node`. The record must be
/// present in this subtree, and `node` holds at least `t` records unless
/// it is the root.
fn remove_from(node: &mut Node, address: Address, t: usize) -> BlockRecord {
    match node.search(address) {
        Ok(i) => {
            if node.is_leaf() {
                node.records.remove(i)
            } else if node.children[i].records.len() >= t {
                // Promote the in-order predecessor, then delete it from
                // the left subtree.
                let pred = rightmost_record(&node.children[i]);
                let removed = std::mem::replace(&mut node.records[i], pred);
                remove_from(&mut node.children[i], pred.address, t);
                removed
            } else if node.children[i + 1].records.len() >= t {
                // Promote the in-order successor from the right subtree.
                let succ = leftmost_record(&node.children[i + 1]);
                let removed = std::mem::replace(&mut node.records[i], succ);
                remove_from(&mut node.children[i + 1], succ.address, t);
                removed
            } else {
                // Both neighbors are minimal: pull the separator down and
                // merge, then delete from the merged child.
                merge_children(node, i);
                remove_from(&mut node.children[i], address, t)
            }
        }
        Err(i) => {
            debug_assert!(!node.is_leaf(), "address vanished during descent");
            let i = fill_child(node, i, t);
            remove_from(&mut node.children[i], address, t)
        }
    }
}

/// Guarantee that the child at `idx` holds at least `t` records before
/// descending into it, borrowing from an adjacent sibling with spare
/// capacity or merging with one. Returns the (possibly shifted) child
/// index to descend into.
fn fill_child(node: &mut Node, idx: usize, t: usize) -> usize {
    if node.children[idx].records.len() >= t {
        return idx;
    }

    if idx > 0 && node.children[idx - 1].records.len() >= t {
        borrow_from_left(node, idx);
        idx
    } else if idx < node.children.len() - 1 && node.children[idx + 1].records.len() >= t {
        borrow_from_right(node, idx);
        idx
    } else if idx < node.children.len() - 1 {
        merge_children(node, idx);
        idx
    } else {
        merge_children(node, idx - 1);
        idx - 1
    }
}

/// Rotate one record through the parent from the left sibling; internal
/// siblings hand over their rightmost child as well.
fn borrow_from_left(node: &mut Node, idx: usize) {
    let (sibling_record, sibling_child) = {
        let left = &mut node.children[idx - 1];
        let record = left
            .records
            .pop()
            .unwrap_or_else(|| unreachable!("donor sibling is non-empty"));
        (record, left.children.pop())
    };
    let separator = std::mem::replace(&mut node.records[idx - 1], sibling_record);
    let child = &mut node.children[idx];
    child.records.insert(0, separator);
    if let Some(grandchild) = sibling_child {
        child.children.insert(0, grandchild);
    }
}

/// Mirror of [`borrow_from_left`] for the right sibling.
fn borrow_from_right(node: &mut Node, idx: usize) {
    let (sibling_record, sibling_child) = {
        let right = &mut node.children[idx + 1];
        let record = right.records.remove(0);
        let grandchild = if right.children.is_empty() {
            None
        } else {
            Some(right.children.remove(0))
        };
        (record, grandchild)
    };
    let separator = std::mem::replace(&mut node.records[idx], sibling_record);
    let child = &mut node.children[idx];
    child.records.push(separator);
    if let Some(grandchild) = sibling_child {
        child.children.push(grandchild);
    }
}

/// Merge the child at `idx`, the separating parent record, and the child
/// at `idx + 1` into a single node.
fn merge_children(node: &mut Node, idx: usize) {
    let separator = node.records.remove(idx);
    let right = node.children.remove(idx + 1);
    let left = &mut node.children[idx];
    left.records.push(separator);
    left.records.extend(right.records);
    left.children.extend(right.children);
}

fn rightmost_record(node: &Node) -> BlockRecord {
    let mut node = node;
    while !node.is_leaf() {
        node = node
            .children
            .last()
            .unwrap_or_else(|| unreachable!("internal node has children"));
    }
    *node
        .records
        .last()
        .unwrap_or_else(|| unreachable!("node on descent path is non-empty"))
}

fn leftmost_record(node: &Node) -> BlockRecord {
    let mut node = node;
    while !node.is_leaf() {
        node = &node.children[0];
    }
    node.records[0]
}

/// Recursive invariant check. Returns the leaf depth of the subtree so
/// callers can assert all leaves sit at the same level.
fn check_node(
    node: &Node,
    t: usize,
    is_root: bool,
    lower: Option<Address>,
    upper: Option<Address>,
    count: &mut usize,
) -> usize {
    let n = node.records.len();
    if is_root {
        assert!(n <= 2 * t - 1, "root holds {} records, max {}", n, 2 * t - 1);
    } else {
        assert!(
            n >= t - 1 && n <= 2 * t - 1,
            "node holds {} records, bounds [{}, {}]",
            n,
            t - 1,
            2 * t - 1
        );
    }

    for window in node.records.windows(2) {
        assert!(
            window[0].address < window[1].address,
            "records out of order: 0x{:x} before 0x{:x}",
            window[0].address,
            window[1].address
        );
    }
    for record in &node.records {
        assert!(
            record.size <= record.reserved,
            "record 0x{:x} has size {} beyond its reservation {}",
            record.address,
            record.size,
            record.reserved
        );
    }
    if let Some(bound) = lower {
        assert!(
            node.records[0].address > bound,
            "subtree record 0x{:x} below parent separator 0x{:x}",
            node.records[0].address,
            bound
        );
    }
    if let Some(bound) = upper {
        assert!(
            node.records[n - 1].address < bound,
            "subtree record 0x{:x} above parent separator 0x{:x}",
            node.records[n - 1].address,
            bound
        );
    }

    *count += n;

    if node.is_leaf() {
        return 0;
    }

    assert_eq!(
        node.children.len(),
        n + 1,
        "internal node child count does not match record count"
    );

    let mut leaf_depth = None;
    for (i, child) in node.children.iter().enumerate() {
        let child_lower = if i == 0 {
            lower
        } else {
            Some(node.records[i - 1].address)
        };
        let child_upper = if i == n {
            upper
        } else {
            Some(node.records[i].address)
        };
        let depth = check_node(child, t, false, child_lower, child_upper, count);
        match leaf_depth {
            None => leaf_depth = Some(depth),
            Some(expected) => {
                assert_eq!(expected, depth, "leaves at unequal depths");
            }
        }
    }
    leaf_depth.unwrap_or(0) + 1
}
