//! Per-artifact mutual exclusion
//!
//! Two requests touching the same `(project, filename)` would otherwise
//! interleave writes to the live file and to the ledger. Each mutating or
//! executing operation holds the artifact's guard for its whole duration;
//! different artifacts proceed in parallel. An entry lives only while some
//! request holds or waits on it.

use autofix_artifact::{Filename, ProjectName};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Key = (ProjectName, Filename);
type Table = DashMap<Key, Arc<Mutex<()>>>;

/// Lock table keyed by artifact
#[derive(Debug, Default)]
pub struct ArtifactLocks {
    locks: Arc<Table>,
}

impl ArtifactLocks {
    /// Create empty lock table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `(project, filename)`
    pub async fn acquire(&self, project: &ProjectName, filename: &Filename) -> ArtifactGuard {
        let key = (project.clone(), filename.clone());
        // Clone the Arc out so no map shard stays locked across the await
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        ArtifactGuard {
            guard: Some(guard),
            key,
            table: Arc::clone(&self.locks),
        }
    }

    /// Number of artifacts currently held or waited on
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no artifact is held or waited on
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one artifact; released on drop
pub struct ArtifactGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: Key,
    table: Arc<Table>,
}

impl fmt::Debug for ArtifactGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactGuard")
            .field("project", &self.key.0)
            .field("filename", &self.key.1)
            .finish_non_exhaustive()
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The table's own Arc is the only one left once nobody holds or waits
        self.table.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
