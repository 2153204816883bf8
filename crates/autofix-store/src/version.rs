//! Version store: immutable, timestamp-keyed artifact snapshots

use crate::blob::BlobStore;
use crate::error::StoreError;
use autofix_artifact::{Filename, ProjectName, SnapshotKey, SnapshotMeta};
use chrono::{Duration, NaiveDateTime, SubsecRound, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Version store errors
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// Snapshot could not be persisted
    #[error("failed to write snapshot {key}: {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// No snapshot under this key
    #[error("snapshot not found: {key}")]
    NotFound { key: String },

    /// Backend failed while reading or listing
    #[error("failed to read snapshots for {target}: {source}")]
    ReadFailed {
        target: String,
        #[source]
        source: StoreError,
    },
}

/// Append-only snapshot storage over a [`BlobStore`]
///
/// Capture times are strictly increasing per project, so every `put` adds
/// exactly one entry to that project's listing and listings are
/// chronological.
pub struct VersionStore {
    blobs: Arc<dyn BlobStore>,
    last_captured: Mutex<HashMap<ProjectName, NaiveDateTime>>,
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore").finish_non_exhaustive()
    }
}

impl VersionStore {
    /// Create store over `blobs`
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            last_captured: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot `content` for `(project, filename)`
    ///
    /// # Errors
    /// Returns [`VersionError::WriteFailed`] if the backend did not store it.
    pub async fn put(
        &self,
        project: &ProjectName,
        filename: &Filename,
        content: &str,
    ) -> Result<SnapshotKey, VersionError> {
        let mut last = self.last_captured.lock().await;

        let floor = match last.get(project) {
            Some(at) => Some(*at),
            None => self
                .newest_stored(project)
                .await
                .map_err(|source| VersionError::WriteFailed {
                    key: SnapshotKey::prefix(project),
                    source,
                })?,
        };

        let now = Utc::now().naive_utc().trunc_subsecs(0);
        let captured_at = match floor {
            Some(prev) if now <= prev => prev + Duration::seconds(1),
            _ => now,
        };

        let key = SnapshotKey::new(project.clone(), captured_at, filename.clone());
        let rendered = key.to_string();
        self.blobs
            .put(&rendered, content.as_bytes())
            .await
            .map_err(|source| {
                tracing::error!(key = %rendered, error = %source, "Snapshot write failed");
                VersionError::WriteFailed {
                    key: rendered.clone(),
                    source,
                }
            })?;

        last.insert(project.clone(), captured_at);
        tracing::info!(key = %rendered, size = content.len(), "Snapshot stored");
        Ok(key)
    }

    /// Snapshots of `project`, oldest first
    ///
    /// # Errors
    /// Returns [`VersionError::ReadFailed`] if the backend cannot list.
    pub async fn list(&self, project: &ProjectName) -> Result<Vec<SnapshotMeta>, VersionError> {
        let prefix = SnapshotKey::prefix(project);
        let entries = self
            .blobs
            .list(&prefix)
            .await
            .map_err(|source| VersionError::ReadFailed {
                target: prefix.clone(),
                source,
            })?;

        let mut metas: Vec<SnapshotMeta> = entries
            .into_iter()
            .filter_map(|entry| match entry.key.parse::<SnapshotKey>() {
                Ok(key) if key.project() == project => Some(SnapshotMeta::new(key, entry.size)),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(
                        key = %entry.key,
                        error = %e,
                        "Skipping unparseable snapshot key"
                    );
                    None
                }
            })
            .collect();
        metas.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(metas)
    }

    /// Content stored under `key`
    ///
    /// # Errors
    /// Returns [`VersionError::NotFound`] for unknown keys and
    /// [`VersionError::ReadFailed`] if the backend fails.
    pub async fn get(&self, key: &SnapshotKey) -> Result<String, VersionError> {
        let rendered = key.to_string();
        let bytes = self
            .blobs
            .get(&rendered)
            .await
            .map_err(|source| VersionError::ReadFailed {
                target: rendered.clone(),
                source,
            })?
            .ok_or_else(|| VersionError::NotFound {
                key: rendered.clone(),
            })?;

        String::from_utf8(bytes).map_err(|e| VersionError::ReadFailed {
            target: rendered.clone(),
            source: StoreError::Corrupt {
                key: rendered,
                reason: e.to_string(),
            },
        })
    }

    async fn newest_stored(
        &self,
        project: &ProjectName,
    ) -> Result<Option<NaiveDateTime>, StoreError> {
        let entries = self.blobs.list(&SnapshotKey::prefix(project)).await?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry.key.parse::<SnapshotKey>().ok())
            .map(|key| key.captured_at())
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;

    fn names() -> (ProjectName, Filename) {
        (
            ProjectName::new("demo").unwrap(),
            Filename::new("main.py").unwrap(),
        )
    }

    #[tokio::test]
    async fn rapid_puts_get_distinct_increasing_keys() {
        let store = VersionStore::new(Arc::new(MemoryBlobStore::new()));
        let (project, filename) = names();

        let mut keys = Vec::new();
        for i in 0..5 {
            keys.push(store.put(&project, &filename, &format!("v{i}")).await.unwrap());
        }

        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        let listed = store.list(&project).await.unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(
            listed.iter().map(|m| m.key.clone()).collect::<Vec<_>>(),
            keys
        );
    }

    #[tokio::test]
    async fn get_returns_exact_content() {
        let store = VersionStore::new(Arc::new(MemoryBlobStore::new()));
        let (project, filename) = names();
        let content = "print('héllo')\n\n";

        let key = store.put(&project, &filename, content).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), content);
        assert_eq!(store.list(&project).await.unwrap()[0].size, content.len() as u64);
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let store = VersionStore::new(Arc::new(MemoryBlobStore::new()));
        let key: SnapshotKey = "demo/2020-01-01_00-00-00_main.py".parse().unwrap();
        assert!(matches!(
            store.get(&key).await,
            Err(VersionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn listing_ignores_other_projects() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = VersionStore::new(blobs.clone());
        let (project, filename) = names();
        let other = ProjectName::new("demo2").unwrap();

        store.put(&project, &filename, "a").await.unwrap();
        store.put(&other, &filename, "b").await.unwrap();
        blobs.put("demo/garbage", b"x").await.unwrap();

        let listed = store.list(&project).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key.project(), &project);
    }

    #[tokio::test]
    async fn capture_times_continue_after_existing_snapshots() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let (project, filename) = names();

        // A snapshot stamped in the future, as if written by a skewed clock
        blobs
            .put("demo/2999-01-01_00-00-00_main.py", b"future")
            .await
            .unwrap();

        let store = VersionStore::new(blobs);
        let key = store.put(&project, &filename, "next").await.unwrap();
        assert_eq!(key.to_string(), "demo/2999-01-01_00-00-01_main.py");
    }
}
