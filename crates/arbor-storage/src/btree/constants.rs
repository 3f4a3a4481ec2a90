//! B+ tree sizing rules.

pub use arbor_common::config::{DEFAULT_TREE_WIDTH, MIN_TREE_WIDTH};

/// Minimum occupancy of a non-root node, `ceil((width + 1) / 2)`.
/// A node below this after a delete borrows from or merges with a sibling.
#[inline]
pub(crate) fn half_width(width: usize) -> usize {
    (width + 2) / 2
}

/// Cut index for an overflowing node (`width + 1` items). Items from this
/// index on move to the new right sibling.
#[inline]
pub(crate) fn split_point(width: usize) -> usize {
    width / 2 + 1
}
