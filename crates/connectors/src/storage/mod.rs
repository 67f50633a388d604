//! Object-storage collaborator. Keys are `/`-separated and relative to the
//! store root, e.g. `raw/customer_details/2024-06-01.xml`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod local;
pub mod memory;

pub use local::LocalObjectStore;
pub use memory::InMemoryObjectStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub(crate) fn io(key: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io {
                key: key.to_string(),
                source,
            }
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Io { .. } | StorageError::Unavailable(_))
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Creates or replaces the object. Readers never observe partial content.
    async fn put(&self, key: &str, content: &[u8]) -> Result<(), StorageError>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Rejects absolute keys and keys that escape the root.
pub fn check_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// Joins key segments with `/`, dropping empty ones.
pub fn join_key<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .flat_map(|p| p.split('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_escaping_keys() {
        assert!(check_key("raw/customer_details/a.xml").is_ok());
        assert!(check_key("/etc/passwd").is_err());
        assert!(check_key("raw/../secret").is_err());
        assert!(check_key("raw//a").is_err());
        assert!(check_key("").is_err());
    }

    #[test]
    fn joins_segments() {
        assert_eq!(join_key(["validated/", "customer_feedback", "eu/f.csv"]), "validated/customer_feedback/eu/f.csv");
        assert_eq!(join_key(["", "a"]), "a");
    }
}
