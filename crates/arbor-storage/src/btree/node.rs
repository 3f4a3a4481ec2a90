//! Leaf and internal B+ tree nodes.

use super::arena::NodeId;
use crate::record::Record;

/// A key/record pair stored in a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: i64,
    pub record: Record,
}

impl Entry {
    pub fn new(key: i64, record: Record) -> Self {
        Self { key, record }
    }
}

/// Leaf node: sorted entries plus a link to the next leaf in key order.
#[derive(Debug, Clone)]
pub struct LeafNode {
    entries: Vec<Entry>,
    next: Option<NodeId>,
    max_key: Option<i64>,
}

impl LeafNode {
    /// Creates an empty leaf. One slot beyond `width` is reserved because a
    /// leaf overflows by one entry before it is split.
    pub(crate) fn with_capacity(width: usize) -> Self {
        Self {
            entries: Vec::with_capacity(width + 1),
            next: None,
            max_key: None,
        }
    }

    fn from_entries(entries: Vec<Entry>, next: Option<NodeId>) -> Self {
        let max_key = entries.last().map(|e| e.key);
        Self {
            entries,
            next,
            max_key,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Successor leaf. Maintained on split and merge, not used by lookups.
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// Largest key in this leaf, `None` when empty.
    pub fn max_key(&self) -> Option<i64> {
        self.max_key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bounded linear scan for `key`. Stops at the first larger key.
    pub fn find(&self, key: i64) -> Option<usize> {
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.key > key {
                return None;
            }
            if entry.key == key {
                return Some(i);
            }
        }
        None
    }

    pub fn get(&self, key: i64) -> Option<&Record> {
        self.find(key).map(|i| &self.entries[i].record)
    }

    /// Inserts in sorted position or overwrites an existing key.
    /// Returns the overwritten record.
    pub fn set_entry(&mut self, key: i64, record: Record) -> Option<Record> {
        let pos = self.entries.iter().position(|e| e.key >= key);
        match pos {
            Some(i) if self.entries[i].key == key => {
                Some(std::mem::replace(&mut self.entries[i].record, record))
            }
            Some(i) => {
                self.entries.insert(i, Entry::new(key, record));
                None
            }
            None => {
                self.entries.push(Entry::new(key, record));
                self.max_key = Some(key);
                None
            }
        }
    }

    /// Removes `key`, returning its record. The max key is recomputed from
    /// the new last entry, or cleared when the leaf empties.
    pub fn delete_entry(&mut self, key: i64) -> Option<Record> {
        let i = self.find(key)?;
        let entry = self.entries.remove(i);
        self.refresh_max_key();
        Some(entry.record)
    }

    /// Moves entries `at..` into a new leaf that inherits this leaf's
    /// successor link. The caller relinks this leaf to the new one.
    pub(crate) fn split_off(&mut self, at: usize) -> LeafNode {
        let upper = self.entries.split_off(at);
        self.refresh_max_key();
        LeafNode::from_entries(upper, self.next)
    }

    pub(crate) fn set_next(&mut self, next: Option<NodeId>) {
        self.next = next;
    }

    pub(crate) fn pop_first(&mut self) -> Option<Entry> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.entries.remove(0);
        self.refresh_max_key();
        Some(entry)
    }

    pub(crate) fn pop_last(&mut self) -> Option<Entry> {
        let entry = self.entries.pop();
        self.refresh_max_key();
        entry
    }

    pub(crate) fn push_front(&mut self, entry: Entry) {
        self.entries.insert(0, entry);
        self.refresh_max_key();
    }

    pub(crate) fn push_back(&mut self, entry: Entry) {
        self.entries.push(entry);
        self.refresh_max_key();
    }

    /// Absorbs a right-hand neighbour: its entries and its successor link.
    pub(crate) fn absorb(&mut self, right: LeafNode) {
        self.entries.extend(right.entries);
        self.next = right.next;
        self.refresh_max_key();
    }

    pub(crate) fn refresh_max_key(&mut self) {
        self.max_key = self.entries.last().map(|e| e.key);
    }
}

/// Internal node: child handles ordered by each child's max key.
#[derive(Debug, Clone)]
pub struct InternalNode {
    children: Vec<NodeId>,
    max_key: Option<i64>,
}

impl InternalNode {
    pub(crate) fn with_capacity(width: usize) -> Self {
        Self {
            children: Vec::with_capacity(width + 1),
            max_key: None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn max_key(&self) -> Option<i64> {
        self.max_key
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn position(&self, child: NodeId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    pub(crate) fn insert_child(&mut self, at: usize, child: NodeId) {
        self.children.insert(at, child);
    }

    pub(crate) fn remove_child(&mut self, child: NodeId) -> bool {
        match self.position(child) {
            Some(i) => {
                self.children.remove(i);
                true
            }
            None => false,
        }
    }

    /// Moves children `at..` into a new internal node. Both max keys must be
    /// refreshed by the arena afterwards.
    pub(crate) fn split_off(&mut self, at: usize) -> InternalNode {
        InternalNode {
            children: self.children.split_off(at),
            max_key: None,
        }
    }

    pub(crate) fn pop_first(&mut self) -> Option<NodeId> {
        if self.children.is_empty() {
            None
        } else {
            Some(self.children.remove(0))
        }
    }

    pub(crate) fn pop_last(&mut self) -> Option<NodeId> {
        self.children.pop()
    }

    pub(crate) fn push_front(&mut self, child: NodeId) {
        self.children.insert(0, child);
    }

    pub(crate) fn push_back(&mut self, child: NodeId) {
        self.children.push(child);
    }

    pub(crate) fn absorb(&mut self, right: InternalNode) {
        self.children.extend(right.children);
    }

    pub(crate) fn set_max_key(&mut self, max_key: Option<i64>) {
        self.max_key = max_key;
    }
}

/// A B+ tree node. Never both a leaf and an internal node.
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    pub fn max_key(&self) -> Option<i64> {
        match self {
            Node::Leaf(leaf) => leaf.max_key(),
            Node::Internal(inner) => inner.max_key(),
        }
    }

    /// Entry count for leaves, child count for internal nodes.
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.len(),
            Node::Internal(inner) => inner.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}
