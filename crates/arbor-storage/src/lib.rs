//! Storage engine for ArborDB.
//!
//! This crate provides:
//! - An in-memory B+ tree keyed by `i64` with split, borrow and merge
//! - Records and schemas with strict type validation
//! - Tables binding a schema to a tree and a snapshot file
//! - A catalog of databases and tables, driven through per-client sessions
//! - Full-rewrite CSV snapshots

mod btree;
mod catalog;
mod record;
mod snapshot;
mod table;

pub use btree::{
    BPlusTree, Entry, InternalNode, LeafNode, Node, NodeId, DEFAULT_TREE_WIDTH, MIN_TREE_WIDTH,
};
pub use catalog::{Catalog, Session};
pub use record::{Record, Schema};
pub use snapshot::{read_rows, write_snapshot, SnapshotRow};
pub use table::Table;
