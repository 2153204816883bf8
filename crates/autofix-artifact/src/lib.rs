//! Autofix Artifact Vocabulary
//!
//! Shared domain types for the synthesis/execution/correction workspace.
//!
//! # Core Concepts
//!
//! - [`ProjectName`] / [`Filename`]: validated names that double as path components
//! - [`SnapshotKey`]: `project/YYYY-MM-DD_HH-MM-SS_filename` address of an immutable copy
//! - [`ExecutionAttempt`]: one ledger record per sandbox invocation
//! - [`ContentHash`]: Blake3 fingerprint of source text
//!
//! # Example
//!
//! ```rust,ignore
//! use autofix_artifact::{Filename, ProjectName, SnapshotKey};
//!
//! let key: SnapshotKey = "demo/2024-05-17_09-03-07_main.py".parse()?;
//! assert_eq!(key.filename().as_str(), "main.py");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod hash;
mod key;
mod name;
mod record;

pub use hash::ContentHash;
pub use key::{KeyError, SnapshotKey, SnapshotMeta, KEY_TIMESTAMP_FORMAT};
pub use name::{
    Filename, NameError, ProjectName, DEFAULT_PROJECT, MAX_NAME_LEN, PRIMARY_FILENAME,
};
pub use record::{
    format_ledger_timestamp, ledger_precision, parse_ledger_timestamp, ExecutionAttempt,
    LEDGER_TIMESTAMP_FORMAT,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
