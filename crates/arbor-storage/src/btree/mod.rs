//! In-memory B+ tree index keyed by `i64`.
//!
//! Nodes live in a slot arena and refer to each other by
//! [`NodeId`]. Every node caches the largest key beneath it; descent picks
//! the first child whose cached max key is at least the search key.
//!
//! ```text
//!              [ max 5 ]
//!             /         \
//!      [1 2 3]  ----->  [4 5]
//!       leaf             leaf
//! ```
//!
//! Sizing for width `w`:
//! - a node overflows at `w + 1` items and splits at index `w / 2 + 1`
//! - a non-root node underflows below `ceil((w + 1) / 2)` items and then
//!   borrows from, or merges with, one sibling
//! - the root is never collapsed, so height only grows

mod arena;
mod constants;
mod node;
mod tree;

pub use arena::NodeId;
pub use constants::{DEFAULT_TREE_WIDTH, MIN_TREE_WIDTH};
pub use node::{Entry, InternalNode, LeafNode, Node};
pub use tree::BPlusTree;
