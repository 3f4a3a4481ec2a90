//! Error types for ArborDB.

use thiserror::Error;

/// Result type alias using ArborError.
pub type Result<T> = std::result::Result<T, ArborError>;

/// Coarse classification of an [`ArborError`].
///
/// The transport layer only needs to know which family a failure belongs
/// to; the variant itself carries the detail for the diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Database, table or key absent.
    NotFound,
    /// Primary key missing or a value does not fit its declared column.
    SchemaViolation,
    /// Database or table already present.
    DuplicateExists,
    /// Filesystem operation failed.
    IoFailure,
    /// Caller-supplied statement shape is invalid.
    MalformedStatement,
    /// Everything else (corruption, configuration, authentication).
    Internal,
}

/// Errors that can occur in ArborDB operations.
#[derive(Debug, Error)]
pub enum ArborError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Catalog errors
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("No database selected")]
    NoDatabaseSelected,

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Database already exists: {0}")]
    DatabaseAlreadyExists(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    // Schema errors
    #[error("Missing primary key {column} for table {table}")]
    MissingPrimaryKey { table: String, column: String },

    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Type mismatch for column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    // Statement errors
    #[error("Malformed statement: {0}")]
    MalformedStatement(String),

    // Session errors
    #[error("Authentication failed for user {0}")]
    AuthenticationFailed(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    // B+ tree errors
    #[error("B+ tree corrupted: {0}")]
    BTreeCorrupted(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArborError {
    /// Returns the taxonomy family of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArborError::Io(_) => ErrorKind::IoFailure,
            ArborError::DatabaseNotFound(_)
            | ArborError::NoDatabaseSelected
            | ArborError::TableNotFound(_) => ErrorKind::NotFound,
            ArborError::DatabaseAlreadyExists(_) | ArborError::TableAlreadyExists(_) => {
                ErrorKind::DuplicateExists
            }
            ArborError::MissingPrimaryKey { .. }
            | ArborError::UnknownColumn { .. }
            | ArborError::TypeMismatch { .. }
            | ArborError::InvalidSchema(_) => ErrorKind::SchemaViolation,
            ArborError::MalformedStatement(_) | ArborError::InvalidName(_) => {
                ErrorKind::MalformedStatement
            }
            ArborError::AuthenticationFailed(_)
            | ArborError::AuthenticationRequired
            | ArborError::BTreeCorrupted(_)
            | ArborError::ConfigError(_)
            | ArborError::InvalidParameter { .. }
            | ArborError::Internal(_) => ErrorKind::Internal,
        }
    }
}
