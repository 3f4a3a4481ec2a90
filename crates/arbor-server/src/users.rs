//! Flat-file user accounts.

use arbor_common::{ArborError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Account written to a freshly created users file.
pub const DEFAULT_ACCOUNT: (&str, &str) = ("root", "1234");

/// Username to password map loaded from a `user:password` per line file.
#[derive(Debug, Default)]
pub struct UserStore {
    users: HashMap<String, String>,
}

impl UserStore {
    /// Loads the users file, creating it with [`DEFAULT_ACCOUNT`] when absent.
    ///
    /// Lines without exactly one `:` are skipped.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, format!("{}:{}\n", DEFAULT_ACCOUNT.0, DEFAULT_ACCOUNT.1))?;
            info!(path = %path.display(), "created users file with default account");
        }

        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    fn parse(text: &str) -> Self {
        let users = text
            .lines()
            .filter_map(|line| {
                let mut parts = line.trim().split(':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(user), Some(password), None) if !user.is_empty() => {
                        Some((user.to_string(), password.to_string()))
                    }
                    _ => None,
                }
            })
            .collect();
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Checks a user name and password.
    pub fn authenticate(&self, user: &str, password: &str) -> Result<()> {
        match self.users.get(user) {
            Some(stored) if stored == password => Ok(()),
            _ => Err(ArborError::AuthenticationFailed(user.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_default_account() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf").join("users.txt");
        let store = UserStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.authenticate("root", "1234").is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), "root:1234\n");
    }

    #[test]
    fn test_open_reads_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.txt");
        fs::write(&path, "ann:pw\nbad line\nx:y:z\n\nbob:\n").unwrap();
        let store = UserStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.authenticate("ann", "pw").is_ok());
        assert!(store.authenticate("bob", "").is_ok());
        assert!(store.authenticate("root", "1234").is_err());
    }

    #[test]
    fn test_wrong_password() {
        let store = UserStore::parse("root:1234");
        let err = store.authenticate("root", "4321").unwrap_err();
        assert!(matches!(err, ArborError::AuthenticationFailed(ref u) if u == "root"));
        assert!(store.authenticate("nobody", "1234").is_err());
    }
}
