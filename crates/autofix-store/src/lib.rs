//! Autofix Store
//!
//! Durable state for the correction workspace:
//!
//! - [`VersionStore`]: immutable snapshots keyed `project/timestamp_filename`
//!   over a [`BlobStore`]
//! - [`HistoryLedger`]: one [`ExecutionAttempt`](autofix_artifact::ExecutionAttempt)
//!   per sandbox run, partitioned by project and ordered by timestamp, over a
//!   [`RecordStore`]
//!
//! Both capabilities come with an in-memory backend and a filesystem one.
//! Backend failures are always surfaced; nothing here retries.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod blob;
mod config;
mod error;
mod fs;
mod jsonl;
mod ledger;
mod record;
mod version;

pub use blob::{validate_key, BlobEntry, BlobStore, MemoryBlobStore};
pub use config::{StorageBackend, StorageConfig};
pub use error::StoreError;
pub use fs::FsBlobStore;
pub use jsonl::JsonlRecordStore;
pub use ledger::{HistoryLedger, HistorySearch, LedgerError};
pub use record::{
    validate_partition, MemoryRecordStore, Record, RecordQuery, RecordStore, SortKeyCondition,
};
pub use version::{VersionError, VersionStore};
