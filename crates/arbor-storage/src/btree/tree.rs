//! Arena-backed B+ tree keyed by `i64`.

use super::arena::{NodeArena, NodeId};
use super::constants::{half_width, split_point, DEFAULT_TREE_WIDTH, MIN_TREE_WIDTH};
use super::node::{Entry, InternalNode, LeafNode, Node};
use crate::record::Record;
use arbor_common::{ArborError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Thread-safe B+ tree mapping `i64` keys to records.
///
/// Lookups and full scans take the tree lock in shared mode; `set`,
/// `remove` and `update` take it exclusively for the whole descent and
/// unwind, so a reader never observes a half-applied split or merge.
///
/// The root is exempt from minimum occupancy and a single-child root is
/// never collapsed: the height only grows.
pub struct BPlusTree {
    inner: RwLock<TreeInner>,
    width: usize,
    half_width: usize,
}

impl BPlusTree {
    /// Creates an empty tree. Widths below [`MIN_TREE_WIDTH`] are raised to it.
    pub fn new(width: usize) -> Self {
        let width = width.max(MIN_TREE_WIDTH);
        Self {
            inner: RwLock::new(TreeInner::new(width)),
            width,
            half_width: half_width(width),
        }
    }

    /// Maximum entries (leaf) or children (internal) per node.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Minimum occupancy of a non-root node.
    pub fn half_width(&self) -> usize {
        self.half_width
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.inner.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels, 1 when the root is a leaf.
    pub fn height(&self) -> usize {
        self.inner.read().height()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.inner.read().arena.live()
    }

    /// Point lookup.
    pub fn get(&self, key: i64) -> Option<Record> {
        self.inner.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: i64) -> bool {
        self.inner.read().get(key).is_some()
    }

    /// Inserts or overwrites `key`, splitting overflowing nodes on the way
    /// back up. Returns the previous record.
    pub fn set(&self, key: i64, record: Record) -> Option<Record> {
        self.inner.write().set(key, record)
    }

    /// Removes `key`, rebalancing underfull nodes on the way back up.
    pub fn remove(&self, key: i64) -> Option<Record> {
        self.inner.write().remove(key)
    }

    /// Overwrites `key` only if it is already present.
    pub fn update(&self, key: i64, record: Record) -> bool {
        let mut inner = self.inner.write();
        if inner.get(key).is_none() {
            return false;
        }
        inner.set(key, record);
        true
    }

    /// Copies out every entry. No ordering is implied by the map.
    pub fn all_entries(&self) -> HashMap<i64, Record> {
        let inner = self.inner.read();
        let mut out = HashMap::with_capacity(inner.len);
        inner.collect(inner.root, &mut out);
        out
    }

    /// Verifies the structural invariants: node kinds, capacity, sorted
    /// contents, fresh max keys, equal leaf depth and the leaf chain.
    pub fn check_invariants(&self) -> Result<()> {
        self.inner.read().check_invariants()
    }
}

impl Default for BPlusTree {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_WIDTH)
    }
}

impl std::fmt::Debug for BPlusTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("BPlusTree")
            .field("width", &self.width)
            .field("len", &inner.len)
            .field("height", &inner.height())
            .finish()
    }
}

/// Where a descent goes next from a node.
enum Route {
    Leaf,
    Child(NodeId),
    Miss,
}

/// An entry or child moved between siblings.
enum Moved {
    Entry(Entry),
    Child(NodeId),
}

struct TreeInner {
    arena: NodeArena,
    root: NodeId,
    width: usize,
    half_width: usize,
    len: usize,
}

impl TreeInner {
    fn new(width: usize) -> Self {
        let mut arena = NodeArena::new();
        let root = arena.allocate(Node::Leaf(LeafNode::with_capacity(width)));
        Self {
            arena,
            root,
            width,
            half_width: half_width(width),
            len: 0,
        }
    }

    fn height(&self) -> usize {
        let mut height = 1;
        let mut id = self.root;
        while let Node::Internal(inner) = &self.arena[id] {
            match inner.children().first() {
                Some(&child) => {
                    id = child;
                    height += 1;
                }
                None => break,
            }
        }
        height
    }

    /// First child whose max key is `>= key`.
    fn route(&self, id: NodeId, key: i64) -> Route {
        match &self.arena[id] {
            Node::Leaf(_) => Route::Leaf,
            Node::Internal(inner) => inner
                .children()
                .iter()
                .copied()
                .find(|&c| self.arena[c].max_key().is_some_and(|max| key <= max))
                .map_or(Route::Miss, Route::Child),
        }
    }

    fn get(&self, key: i64) -> Option<&Record> {
        let mut id = self.root;
        loop {
            match self.route(id, key) {
                Route::Leaf => {
                    return match &self.arena[id] {
                        Node::Leaf(leaf) => leaf.get(key),
                        Node::Internal(_) => None,
                    };
                }
                Route::Child(child) => id = child,
                Route::Miss => return None,
            }
        }
    }

    fn set(&mut self, key: i64, record: Record) -> Option<Record> {
        let previous = self.insert(None, self.root, key, record);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    fn insert(
        &mut self,
        parent: Option<NodeId>,
        id: NodeId,
        key: i64,
        record: Record,
    ) -> Option<Record> {
        // Keys beyond every child's max go to the last child.
        let route = match self.route(id, key) {
            Route::Miss => self
                .arena
                .internal(id)
                .children()
                .last()
                .map_or(Route::Miss, |&c| Route::Child(c)),
            route => route,
        };

        let previous = match route {
            Route::Leaf => self.arena.leaf_mut(id).set_entry(key, record),
            Route::Child(child) => {
                let previous = self.insert(Some(id), child, key, record);
                self.arena.refresh_max_key(id);
                previous
            }
            Route::Miss => {
                // Childless internal node: give it a fresh leaf.
                let mut leaf = LeafNode::with_capacity(self.width);
                leaf.set_entry(key, record);
                let child = self.arena.allocate(Node::Leaf(leaf));
                self.arena.add_child(id, child);
                None
            }
        };

        self.split(parent, id);
        previous
    }

    /// Splits `id` if it overflows and hangs the new right sibling under
    /// `parent`, or under a new root when `id` was the root.
    fn split(&mut self, parent: Option<NodeId>, id: NodeId) {
        let width = self.width;
        let at = split_point(width);
        let sibling = match &mut self.arena[id] {
            Node::Leaf(leaf) if leaf.len() > width => Node::Leaf(leaf.split_off(at)),
            Node::Internal(inner) if inner.len() > width => Node::Internal(inner.split_off(at)),
            _ => return,
        };
        let sibling = self.arena.allocate(sibling);
        if let Node::Leaf(leaf) = &mut self.arena[id] {
            leaf.set_next(Some(sibling));
        }
        self.arena.refresh_max_key(id);
        self.arena.refresh_max_key(sibling);

        match parent {
            Some(parent) => self.arena.add_child(parent, sibling),
            None => {
                let root = self
                    .arena
                    .allocate(Node::Internal(InternalNode::with_capacity(width)));
                self.arena.add_child(root, id);
                self.arena.add_child(root, sibling);
                self.root = root;
                debug!(height = self.height(), "B+ tree root split");
            }
        }
    }

    fn remove(&mut self, key: i64) -> Option<Record> {
        let removed = self.remove_at(None, self.root, key);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn remove_at(&mut self, parent: Option<NodeId>, id: NodeId, key: i64) -> Option<Record> {
        let removed = match self.route(id, key) {
            Route::Leaf => self.arena.leaf_mut(id).delete_entry(key),
            Route::Child(child) => {
                let removed = self.remove_at(Some(id), child, key);
                self.arena.refresh_max_key(id);
                removed
            }
            Route::Miss => None,
        };

        if removed.is_some() {
            if let Some(parent) = parent {
                if self.arena[id].len() < self.half_width {
                    self.rebalance(parent, id);
                }
            }
        }
        removed
    }

    /// Restores occupancy of an underfull `id` against one sibling: the
    /// successor when there is one, else the predecessor. Precedence is
    /// borrow-left, borrow-right, merge-left, merge-right. Leaves and
    /// internal nodes follow the same policy.
    fn rebalance(&mut self, parent: NodeId, id: NodeId) {
        let siblings = self.arena.internal(parent).children();
        let Some(pos) = siblings.iter().position(|&c| c == id) else {
            return;
        };
        let (left, right) = if pos + 1 < siblings.len() {
            (None, Some(siblings[pos + 1]))
        } else if pos > 0 {
            (Some(siblings[pos - 1]), None)
        } else {
            (None, None)
        };

        let len = self.arena[id].len();
        if let Some(left) = left {
            if self.arena[left].len() > self.half_width {
                self.borrow_from_left(left, id);
                return;
            }
        }
        if let Some(right) = right {
            if self.arena[right].len() > self.half_width {
                self.borrow_from_right(id, right);
                return;
            }
        }
        if let Some(left) = left {
            if self.arena[left].len() + len <= self.width {
                self.merge(parent, left, id);
                return;
            }
        }
        if let Some(right) = right {
            if len + self.arena[right].len() <= self.width {
                self.merge(parent, id, right);
            }
        }
    }

    /// Moves the last entry/child of `left` to the front of `id`.
    fn borrow_from_left(&mut self, left: NodeId, id: NodeId) {
        let moved = match &mut self.arena[left] {
            Node::Leaf(leaf) => leaf.pop_last().map(Moved::Entry),
            Node::Internal(inner) => inner.pop_last().map(Moved::Child),
        };
        match moved {
            Some(Moved::Entry(entry)) => self.arena.leaf_mut(id).push_front(entry),
            Some(Moved::Child(child)) => self.arena.internal_mut(id).push_front(child),
            None => return,
        }
        self.arena.refresh_max_key(left);
        self.arena.refresh_max_key(id);
    }

    /// Moves the first entry/child of `right` to the back of `id`.
    fn borrow_from_right(&mut self, id: NodeId, right: NodeId) {
        let moved = match &mut self.arena[right] {
            Node::Leaf(leaf) => leaf.pop_first().map(Moved::Entry),
            Node::Internal(inner) => inner.pop_first().map(Moved::Child),
        };
        match moved {
            Some(Moved::Entry(entry)) => self.arena.leaf_mut(id).push_back(entry),
            Some(Moved::Child(child)) => self.arena.internal_mut(id).push_back(child),
            None => return,
        }
        self.arena.refresh_max_key(right);
        self.arena.refresh_max_key(id);
    }

    /// `left` absorbs `right`, which is detached from `parent` and freed.
    fn merge(&mut self, parent: NodeId, left: NodeId, right: NodeId) {
        self.arena.delete_child(parent, right);
        let absorbed = self.arena.release(right);
        match (&mut self.arena[left], absorbed) {
            (Node::Leaf(target), Node::Leaf(source)) => target.absorb(source),
            (Node::Internal(target), Node::Internal(source)) => target.absorb(source),
            _ => panic!("BTree: siblings {} and {} differ in kind", left, right),
        }
        self.arena.refresh_max_key(left);
        self.arena.refresh_max_key(parent);
    }

    fn collect(&self, id: NodeId, out: &mut HashMap<i64, Record>) {
        match &self.arena[id] {
            Node::Leaf(leaf) => {
                out.extend(leaf.entries().iter().map(|e| (e.key, e.record.clone())));
            }
            Node::Internal(inner) => {
                for &child in inner.children() {
                    self.collect(child, out);
                }
            }
        }
    }

    fn check_invariants(&self) -> Result<()> {
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        self.check_node(self.root, 1, &mut leaf_depth, &mut leaves)?;

        let mut previous: Option<i64> = None;
        let mut count = 0;
        for &id in &leaves {
            let Node::Leaf(leaf) = &self.arena[id] else {
                return Err(corrupted(format!("{} listed as leaf", id)));
            };
            for entry in leaf.entries() {
                if previous.is_some_and(|p| p >= entry.key) {
                    return Err(corrupted(format!("key {} out of order in {}", entry.key, id)));
                }
                previous = Some(entry.key);
                count += 1;
            }
        }
        if count != self.len {
            return Err(corrupted(format!(
                "{} entries reachable, {} recorded",
                count, self.len
            )));
        }

        for (i, &id) in leaves.iter().enumerate() {
            let Node::Leaf(leaf) = &self.arena[id] else {
                continue;
            };
            let expected = leaves.get(i + 1).copied();
            if leaf.next() != expected {
                return Err(corrupted(format!(
                    "leaf {} links to {:?}, expected {:?}",
                    id,
                    leaf.next(),
                    expected
                )));
            }
        }
        Ok(())
    }

    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<NodeId>,
    ) -> Result<()> {
        let node = self
            .arena
            .get(id)
            .ok_or_else(|| corrupted(format!("dangling node {}", id)))?;
        if node.len() > self.width {
            return Err(corrupted(format!(
                "node {} holds {} items, width is {}",
                id,
                node.len(),
                self.width
            )));
        }

        match node {
            Node::Leaf(leaf) => {
                if leaf.max_key() != leaf.entries().last().map(|e| e.key) {
                    return Err(corrupted(format!("stale max key in leaf {}", id)));
                }
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(corrupted(format!(
                            "leaf {} at depth {}, expected {}",
                            id, depth, d
                        )));
                    }
                    Some(_) => {}
                }
                leaves.push(id);
            }
            Node::Internal(inner) => {
                if inner.is_empty() {
                    return Err(corrupted(format!("internal node {} has no children", id)));
                }
                let mut previous: Option<i64> = None;
                for &child in inner.children() {
                    self.check_node(child, depth + 1, leaf_depth, leaves)?;
                    if let Some(max) = self.arena[child].max_key() {
                        if previous.is_some_and(|p| p >= max) {
                            return Err(corrupted(format!("children of {} out of order", id)));
                        }
                        previous = Some(max);
                    }
                }
                if inner.max_key() != previous {
                    return Err(corrupted(format!("stale max key in internal node {}", id)));
                }
            }
        }
        Ok(())
    }
}

fn corrupted(reason: String) -> ArborError {
    ArborError::BTreeCorrupted(reason)
}
