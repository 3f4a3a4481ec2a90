//! ArborDB common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all ArborDB components.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ArborConfig, ServerConfig, StorageConfig, DEFAULT_TREE_WIDTH, MIN_TREE_WIDTH};
pub use error::{ArborError, ErrorKind, Result};
pub use types::{Column, ColumnType, Value};
