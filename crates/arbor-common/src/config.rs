//! Configuration structures for ArborDB.

use crate::error::{ArborError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default B+ tree fan-out for new tables.
pub const DEFAULT_TREE_WIDTH: usize = 4;

/// Smallest fan-out a tree can be built with.
pub const MIN_TREE_WIDTH: usize = 3;

/// Server configuration for the ArborDB instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
    /// Maximum number of concurrent connections.
    pub max_connections: usize,
    /// Longest accepted request line in bytes.
    pub max_line_length: usize,
    /// Require `LOGIN` before any other statement.
    pub require_auth: bool,
    /// Path to the `username:password` file.
    pub users_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_connections: 100,
            max_line_length: 64 * 1024,
            require_auth: false,
            users_file: PathBuf::from("./data/users.txt"),
        }
    }
}

impl ServerConfig {
    /// Returns the `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage configuration for the database engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory; one subdirectory per database.
    pub data_dir: PathBuf,
    /// Fan-out of every table's B+ tree.
    pub tree_width: usize,
    /// Enable fsync after each snapshot rewrite.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            tree_width: DEFAULT_TREE_WIDTH,
            fsync_enabled: false,
        }
    }
}

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl ArborConfig {
    /// Loads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: ArborConfig = serde_json::from_str(&text)
            .map_err(|e| ArborError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.storage.tree_width < MIN_TREE_WIDTH {
            return Err(ArborError::InvalidParameter {
                name: "tree_width".to_string(),
                value: self.storage.tree_width.to_string(),
            });
        }
        if self.server.port == 0 {
            return Err(ArborError::InvalidParameter {
                name: "port".to_string(),
                value: "0".to_string(),
            });
        }
        if self.server.max_connections == 0 {
            return Err(ArborError::InvalidParameter {
                name: "max_connections".to_string(),
                value: "0".to_string(),
            });
        }
        if self.server.max_line_length == 0 {
            return Err(ArborError::InvalidParameter {
                name: "max_line_length".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.max_line_length, 65536);
        assert!(!config.require_auth);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.tree_width, 4);
        assert!(!config.fsync_enabled);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let original = ArborConfig::default();
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: ArborConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(original.server.host, deserialized.server.host);
        assert_eq!(original.server.port, deserialized.server.port);
        assert_eq!(original.storage.data_dir, deserialized.storage.data_dir);
        assert_eq!(original.storage.tree_width, deserialized.storage.tree_width);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ArborConfig =
            serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.tree_width, DEFAULT_TREE_WIDTH);
    }

    #[test]
    fn test_validate_rejects_narrow_tree() {
        let mut config = ArborConfig::default();
        config.storage.tree_width = 2;
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameter: tree_width = 2");

        config.storage.tree_width = MIN_TREE_WIDTH;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config = ArborConfig {
            server: ServerConfig {
                port: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ArborError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_connections() {
        let config = ArborConfig {
            server: ServerConfig {
                max_connections: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        match config.validate() {
            Err(ArborError::InvalidParameter { name, .. }) => assert_eq!(name, "max_connections"),
            other => panic!("expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"storage": {{"data_dir": "/var/lib/arbor", "tree_width": 8}}}}"#
        )
        .unwrap();

        let config = ArborConfig::load(file.path()).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/arbor"));
        assert_eq!(config.storage.tree_width, 8);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ArborConfig::load(file.path()),
            Err(ArborError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ArborConfig::load("/nonexistent/arbor.json").unwrap_err();
        assert!(matches!(err, ArborError::Io(_)));
    }
}
