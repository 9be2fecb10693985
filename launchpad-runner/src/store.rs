//! Object storage
//!
//! Stand-in for the site bucket. Keys are object keys without a leading
//! slash, e.g. `static/app.js`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors reported by an object store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the write
    #[error("Write to {key} rejected: {reason}")]
    Rejected { key: String, reason: String },

    /// The key cannot be used as an object key
    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),
}

/// Storage the deploy stage writes to and the edge reads from
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes an object, replacing any object at the same key
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Reads an object
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Every key currently stored, in lexical order
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-memory implementation of ObjectStore
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn check_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.starts_with('/') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        check_key(key)?;
        self.objects().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        check_key(key)?;
        Ok(self.objects().get(key).cloned())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.objects().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_replaces_existing_object() {
        let store = InMemoryObjectStore::new();
        store.put("index.html", b"v1".to_vec()).await.unwrap();
        store.put("index.html", b"v2".to_vec()).await.unwrap();

        assert_eq!(store.get("index.html").await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.keys().await.unwrap(), vec!["index.html".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = InMemoryObjectStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_keys() {
        let store = InMemoryObjectStore::new();
        assert!(store.put("", Vec::new()).await.is_err());
        assert!(store.put("/index.html", Vec::new()).await.is_err());
    }
}
