//! Arena allocation for B+ tree nodes.
//!
//! Every node lives in one slot vector owned by the tree. Parent/child and
//! leaf successor links are [`NodeId`] indices into that vector, so a split
//! or merge rewires indices instead of references and no node is ever owned
//! by two parents.

use super::node::{InternalNode, LeafNode, Node};
use std::ops::{Index, IndexMut};

/// Handle of a node inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Slot storage for nodes. Released slots are reused by later allocations.
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
}

impl NodeArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `node` and returns its handle.
    pub(crate) fn allocate(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(node);
            return id;
        }
        let id = NodeId::new(self.slots.len() as u32);
        self.slots.push(Some(node));
        id
    }

    /// Removes a node from the arena and hands back its contents.
    pub(crate) fn release(&mut self, id: NodeId) -> Node {
        match self.slots.get_mut(id.index()).and_then(Option::take) {
            Some(node) => {
                self.free.push(id);
                node
            }
            None => panic!("BTree arena: release of dangling node {}", id),
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Number of live nodes.
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn leaf_mut(&mut self, id: NodeId) -> &mut LeafNode {
        match &mut self[id] {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("BTree arena: node {} is not a leaf", id),
        }
    }

    pub(crate) fn internal(&self, id: NodeId) -> &InternalNode {
        match &self[id] {
            Node::Internal(inner) => inner,
            Node::Leaf(_) => panic!("BTree arena: node {} is not internal", id),
        }
    }

    pub(crate) fn internal_mut(&mut self, id: NodeId) -> &mut InternalNode {
        match &mut self[id] {
            Node::Internal(inner) => inner,
            Node::Leaf(_) => panic!("BTree arena: node {} is not internal", id),
        }
    }

    /// Inserts `child` under `parent`, keeping children ordered by max key.
    pub(crate) fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let child_max = self[child].max_key();
        let inner = self.internal(parent);
        let at = inner
            .children()
            .iter()
            .position(|&c| self[c].max_key() > child_max)
            .unwrap_or(inner.len());
        self.internal_mut(parent).insert_child(at, child);
        self.refresh_max_key(parent);
    }

    /// Detaches `child` from `parent`. The parent's max key is cleared when
    /// it has no children left.
    pub(crate) fn delete_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let removed = self.internal_mut(parent).remove_child(child);
        if removed {
            self.refresh_max_key(parent);
        }
        removed
    }

    /// Recomputes the cached max key of `id` from its own contents.
    pub(crate) fn refresh_max_key(&mut self, id: NodeId) {
        let max_key = match &self[id] {
            Node::Leaf(leaf) => leaf.entries().last().map(|e| e.key),
            Node::Internal(inner) => inner
                .children()
                .iter()
                .filter_map(|&c| self[c].max_key())
                .max(),
        };
        match &mut self[id] {
            Node::Leaf(leaf) => leaf.refresh_max_key(),
            Node::Internal(inner) => inner.set_max_key(max_key),
        }
    }
}

impl Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("BTree arena: dangling node {}", id),
        }
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        match self.slots.get_mut(id.index()).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("BTree arena: dangling node {}", id),
        }
    }
}
