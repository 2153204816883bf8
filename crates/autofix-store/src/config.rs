//! Storage backend selection

use crate::blob::{BlobStore, MemoryBlobStore};
use crate::fs::FsBlobStore;
use crate::jsonl::JsonlRecordStore;
use crate::ledger::HistoryLedger;
use crate::record::{MemoryRecordStore, RecordStore};
use crate::version::VersionStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Which backend family to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit
    Memory,
    /// Snapshots as files, history as JSON lines
    #[default]
    Filesystem,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root for the filesystem backend
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Filesystem,
            root: PathBuf::from("./.autofix"),
        }
    }
}

impl StorageConfig {
    /// In-memory configuration
    #[inline]
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            ..Self::default()
        }
    }

    /// Filesystem configuration rooted at `root`
    #[inline]
    #[must_use]
    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Filesystem,
            root: root.into(),
        }
    }

    /// Snapshot directory for the filesystem backend
    #[must_use]
    pub fn snapshot_root(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    /// History directory for the filesystem backend
    #[must_use]
    pub fn history_root(&self) -> PathBuf {
        self.root.join("history")
    }

    /// Blob backend for snapshots
    #[must_use]
    pub fn blob_store(&self) -> Arc<dyn BlobStore> {
        match self.backend {
            StorageBackend::Memory => Arc::new(MemoryBlobStore::new()),
            StorageBackend::Filesystem => Arc::new(FsBlobStore::new(self.snapshot_root())),
        }
    }

    /// Record backend for history
    #[must_use]
    pub fn record_store(&self) -> Arc<dyn RecordStore> {
        match self.backend {
            StorageBackend::Memory => Arc::new(MemoryRecordStore::new()),
            StorageBackend::Filesystem => Arc::new(JsonlRecordStore::new(self.history_root())),
        }
    }

    /// Version store over [`Self::blob_store`]
    #[must_use]
    pub fn version_store(&self) -> VersionStore {
        VersionStore::new(self.blob_store())
    }

    /// History ledger over [`Self::record_store`]
    #[must_use]
    pub fn history_ledger(&self) -> HistoryLedger {
        HistoryLedger::new(self.record_store())
    }
}
