//! Database/table registry and per-client sessions.
//!
//! The catalog keeps no selection state of its own. Each client owns a
//! [`Session`] naming its current database, and every catalog call takes
//! that session. Table lookups hold the catalog lock only long enough to
//! clone the table handle; row operations then run under the table's own
//! tree lock.

use crate::record::{Record, Schema};
use crate::table::Table;
use arbor_common::{ArborError, Result, StorageConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Selection state of one client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    database: Option<String>,
    table: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected database.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Most recently created table in the current database.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    fn select_database(&mut self, name: &str) {
        self.database = Some(name.to_string());
        self.table = None;
    }

    fn require_database(&self) -> Result<&str> {
        self.database().ok_or(ArborError::NoDatabaseSelected)
    }
}

/// One database: its directory and tables.
struct Database {
    dir: PathBuf,
    tables: HashMap<String, Arc<Table>>,
}

/// Registry of databases and their tables.
pub struct Catalog {
    /// Root data directory; each database is a subdirectory.
    root: PathBuf,
    /// Fan-out for new tables' trees.
    tree_width: usize,
    /// Sync snapshot files after each rewrite.
    fsync: bool,
    databases: RwLock<HashMap<String, Database>>,
}

impl Catalog {
    /// Opens a catalog rooted at `config.data_dir`, creating the directory.
    ///
    /// Databases left on disk by an earlier run are not registered again.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        info!(data_dir = %config.data_dir.display(), tree_width = config.tree_width, "catalog opened");
        Ok(Self {
            root: config.data_dir.clone(),
            tree_width: config.tree_width,
            fsync: config.fsync_enabled,
            databases: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers a database, creates its directory and selects it.
    pub fn create_database(&self, session: &mut Session, name: &str) -> Result<()> {
        check_name(name)?;
        let mut databases = self.databases.write();
        if databases.contains_key(name) {
            return Err(ArborError::DatabaseAlreadyExists(name.to_string()));
        }

        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        databases.insert(
            name.to_string(),
            Database {
                dir,
                tables: HashMap::new(),
            },
        );
        drop(databases);

        session.select_database(name);
        info!(database = name, "database created");
        Ok(())
    }

    /// Selects an existing database for `session`.
    pub fn use_database(&self, session: &mut Session, name: &str) -> Result<()> {
        if !self.databases.read().contains_key(name) {
            return Err(ArborError::DatabaseNotFound(name.to_string()));
        }
        session.select_database(name);
        debug!(database = name, "database selected");
        Ok(())
    }

    /// Creates an empty table in the session's database.
    pub fn create_table(&self, session: &mut Session, name: &str, schema: Schema) -> Result<()> {
        check_name(name)?;
        let database = session.require_database()?.to_string();
        let mut databases = self.databases.write();
        let db = databases
            .get_mut(&database)
            .ok_or_else(|| ArborError::DatabaseNotFound(database.clone()))?;
        if db.tables.contains_key(name) {
            return Err(ArborError::TableAlreadyExists(name.to_string()));
        }

        let path = db.dir.join(format!("{}.csv", name));
        info!(database = %database, table = name, schema = %schema, "table created");
        let table = Table::new(name, schema, self.tree_width, path, self.fsync);
        db.tables.insert(name.to_string(), Arc::new(table));
        drop(databases);

        session.table = Some(name.to_string());
        Ok(())
    }

    /// Resolves a table of the session's database.
    pub fn table(&self, session: &Session, name: &str) -> Result<Arc<Table>> {
        let database = session.require_database()?;
        let databases = self.databases.read();
        let db = databases
            .get(database)
            .ok_or_else(|| ArborError::DatabaseNotFound(database.to_string()))?;
        db.tables
            .get(name)
            .cloned()
            .ok_or_else(|| ArborError::TableNotFound(name.to_string()))
    }

    /// Inserts a row (overwriting any row with the same key) and rewrites
    /// the table's snapshot.
    pub fn insert(&self, session: &Session, table: &str, record: Record) -> Result<()> {
        let table = self.table(session, table)?;
        table.insert(record)?;
        Ok(())
    }

    /// Replaces the row whose primary key matches `record`'s. Returns
    /// `false` when there is no such row.
    pub fn update(&self, session: &Session, table: &str, record: Record) -> Result<bool> {
        self.table(session, table)?.update(record)
    }

    pub fn select(&self, session: &Session, table: &str, key: i64) -> Result<Option<Record>> {
        Ok(self.table(session, table)?.select(key))
    }

    pub fn select_all(&self, session: &Session, table: &str) -> Result<HashMap<i64, Record>> {
        Ok(self.table(session, table)?.select_all())
    }

    /// Deletes a row. Returns whether a row was removed.
    pub fn delete(&self, session: &Session, table: &str, key: i64) -> Result<bool> {
        self.table(session, table)?.delete(key)
    }

    /// Database names, sorted.
    pub fn databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Table names of the session's database, sorted.
    pub fn tables(&self, session: &Session) -> Result<Vec<String>> {
        let database = session.require_database()?;
        let databases = self.databases.read();
        let db = databases
            .get(database)
            .ok_or_else(|| ArborError::DatabaseNotFound(database.to_string()))?;
        let mut names: Vec<String> = db.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Database and table names become path components under the data root,
/// so each must be a single plain component.
fn check_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let plain = match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => part.to_str() == Some(name),
        _ => false,
    };
    if !plain || name.contains(['/', '\\', '\0']) {
        return Err(ArborError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("root", &self.root)
            .field("tree_width", &self.tree_width)
            .field("databases", &self.databases())
            .finish()
    }
}
