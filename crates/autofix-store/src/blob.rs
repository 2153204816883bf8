//! Object-blob capability and in-memory backend

use crate::error::StoreError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Listing entry for a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub key: String,
    pub size: u64,
}

/// Key/value blob storage with prefix listing
///
/// Keys are `/`-separated relative paths. Listings are sorted by key.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous value
    ///
    /// # Errors
    /// Returns [`StoreError`] if the key is invalid or the backend fails.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Fetch the bytes stored under `key`
    ///
    /// # Errors
    /// Returns [`StoreError`] if the key is invalid or the backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// List entries whose key starts with `prefix`, sorted by key
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend fails.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StoreError>;
}

/// Reject keys that could escape a backend's namespace
///
/// # Errors
/// Returns [`StoreError::InvalidKey`] describing the first problem found.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    if key.is_empty() {
        return Err(invalid("empty"));
    }
    if key.starts_with('/') {
        return Err(invalid("absolute"));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(invalid("forbidden character"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(invalid("empty segment")),
            "." | ".." => return Err(invalid("relative segment")),
            s if s.starts_with('.') => return Err(invalid("hidden segment")),
            _ => {}
        }
    }
    Ok(())
}

/// Process-local [`BlobStore`]
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        self.blobs.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_key(key)?;
        Ok(self.blobs.read().get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StoreError> {
        let blobs = self.blobs.read();
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, bytes)| BlobEntry {
                key: key.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }
}
