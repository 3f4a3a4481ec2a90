//! A named table: schema, B+ tree and snapshot file.

use crate::btree::BPlusTree;
use crate::record::{Record, Schema};
use crate::snapshot;
use arbor_common::{ArborError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One table. Rows are keyed by the schema's primary key column.
///
/// Mutations go to the tree first and are then persisted by rewriting the
/// whole snapshot file. A failed rewrite is returned as an error but the
/// in-memory change stays applied.
pub struct Table {
    /// Table name, upper-cased by the statement layer.
    name: String,
    /// Column list; the first column is the primary key.
    schema: Schema,
    /// Row storage.
    tree: BPlusTree,
    /// Snapshot file, `<database dir>/<name>.csv`.
    path: PathBuf,
    /// Sync the snapshot file after every rewrite.
    fsync: bool,
    /// Serializes snapshot rewrites.
    writer: Mutex<()>,
}

impl Table {
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        tree_width: usize,
        path: PathBuf,
        fsync: bool,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            tree: BPlusTree::new(tree_width),
            path,
            fsync,
            writer: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&self) -> &BPlusTree {
        &self.tree
    }

    /// Inserts or overwrites a row. Returns the previous row with that key.
    pub fn insert(&self, record: Record) -> Result<Option<Record>> {
        let key = self.schema.validate(&self.name, &record)?;
        let previous = self.tree.set(key, record);
        self.persist()?;
        Ok(previous)
    }

    /// Replaces the row whose primary key matches `record`'s.
    ///
    /// Returns `false` without touching the tree or the file when no such
    /// row exists.
    pub fn update(&self, record: Record) -> Result<bool> {
        let key = self.schema.validate(&self.name, &record)?;
        if !self.tree.update(key, record) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn select(&self, key: i64) -> Option<Record> {
        self.tree.get(key)
    }

    pub fn select_all(&self) -> HashMap<i64, Record> {
        self.tree.all_entries()
    }

    /// Removes the row with `key`. Returns whether a row was removed.
    pub fn delete(&self, key: i64) -> Result<bool> {
        let removed = self.tree.remove(key).is_some();
        if self.tree.contains_key(key) {
            return Err(ArborError::BTreeCorrupted(format!(
                "key {} still present in {} after delete",
                key, self.name
            )));
        }
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Rewrites the snapshot file from the current tree contents.
    pub fn persist(&self) -> Result<()> {
        let _guard = self.writer.lock();
        let rows = self.tree.all_entries();
        snapshot::write_snapshot(&self.path, &rows, self.fsync).map_err(|e| {
            warn!(table = %self.name, path = %self.path.display(), error = %e, "snapshot rewrite failed");
            e
        })
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("path", &self.path)
            .field("rows", &self.tree.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::read_rows;
    use arbor_common::{Column, ColumnType};
    use tempfile::tempdir;

    fn user_table(dir: &Path) -> Table {
        let schema = Schema::new(vec![
            Column::new("ID", ColumnType::Int),
            Column::new("NAME", ColumnType::String),
        ])
        .unwrap();
        Table::new("USER", schema, 4, dir.join("USER.csv"), false)
    }

    fn user(id: i64, name: &str) -> Record {
        Record::new().with("ID", id).with("NAME", name)
    }

    #[test]
    fn test_insert_persists_every_row() {
        let dir = tempdir().unwrap();
        let table = user_table(dir.path());
        for id in 1..=6 {
            table.insert(user(id, "x")).unwrap();
        }
        assert_eq!(read_rows(table.path()).unwrap().len(), 6);
        assert_eq!(table.select(4), Some(user(4, "x")));
    }

    #[test]
    fn test_insert_rejects_bad_record_without_side_effects() {
        let dir = tempdir().unwrap();
        let table = user_table(dir.path());
        let err = table.insert(Record::new().with("NAME", "x")).unwrap_err();
        assert!(matches!(err, ArborError::MissingPrimaryKey { .. }));
        assert!(table.tree().is_empty());
        assert!(!table.path().exists());
    }

    #[test]
    fn test_update_missing_key_leaves_file_unchanged() {
        let dir = tempdir().unwrap();
        let table = user_table(dir.path());
        table.insert(user(1, "a")).unwrap();
        let before = std::fs::read(table.path()).unwrap();

        assert!(!table.update(user(2, "b")).unwrap());
        assert_eq!(std::fs::read(table.path()).unwrap(), before);
        assert_eq!(table.select(2), None);

        assert!(table.update(user(1, "z")).unwrap());
        assert_eq!(table.select(1), Some(user(1, "z")));
        assert_ne!(std::fs::read(table.path()).unwrap(), before);
    }

    #[test]
    fn test_delete_empties_file() {
        let dir = tempdir().unwrap();
        let table = user_table(dir.path());
        table.insert(user(1, "a")).unwrap();
        assert!(table.delete(1).unwrap());
        assert!(!table.delete(1).unwrap());
        assert_eq!(table.select(1), None);
        assert!(read_rows(table.path()).unwrap().is_empty());
    }

    #[test]
    fn test_io_failure_keeps_memory_change() {
        let dir = tempdir().unwrap();
        let schema = Schema::new(vec![Column::new("ID", ColumnType::Int)]).unwrap();
        let path = dir.path().join("missing").join("T.csv");
        let table = Table::new("T", schema, 4, path, false);

        let err = table.insert(Record::new().with("ID", 1)).unwrap_err();
        assert!(matches!(err, ArborError::Io(_)));
        assert_eq!(table.select(1), Some(Record::new().with("ID", 1)));
    }
}
