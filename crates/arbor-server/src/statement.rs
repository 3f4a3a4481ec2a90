//! Parsed statements handed from the parser to the executor.

use arbor_common::{Column, Value};

/// `WHERE <column> = <integer>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    pub column: String,
    pub key: i64,
}

/// One client statement with its payload already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `CREATE DATABASE <name>`
    CreateDatabase { name: String },
    /// `USE <name>`
    Use { name: String },
    /// `CREATE TABLE <name> (<col> <type>, ...)`
    CreateTable { name: String, columns: Vec<Column> },
    /// `INSERT INTO <table> (<col>, ...) VALUES (<value>, ...)`
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Value>,
    },
    /// `UPDATE <table> SET <col> = <value>, ... WHERE <col> = <key>`
    Update {
        table: String,
        assignments: Vec<(String, Value)>,
        filter: KeyFilter,
    },
    /// `SELECT * FROM <table> [WHERE <col> = <key>]`
    Select {
        table: String,
        filter: Option<KeyFilter>,
    },
    /// `DELETE FROM <table> WHERE <col> = <key>`
    Delete { table: String, filter: KeyFilter },
    ShowDatabases,
    ShowTables,
    Help,
    /// `LOGIN <user> <password>`
    Login { user: String, password: String },
    Exit,
}

impl Statement {
    /// Statements allowed before a client has logged in.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Statement::Login { .. } | Statement::Help | Statement::Exit)
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateDatabase { .. } => "CREATE DATABASE",
            Statement::Use { .. } => "USE",
            Statement::CreateTable { .. } => "CREATE TABLE",
            Statement::Insert { .. } => "INSERT",
            Statement::Update { .. } => "UPDATE",
            Statement::Select { .. } => "SELECT",
            Statement::Delete { .. } => "DELETE",
            Statement::ShowDatabases => "SHOW DATABASES",
            Statement::ShowTables => "SHOW TABLES",
            Statement::Help => "HELP",
            Statement::Login { .. } => "LOGIN",
            Statement::Exit => "EXIT",
        }
    }
}
