//! Error taxonomy for the code assistant
//!
//! Two families:
//! - request errors: the caller asked for something that does not exist
//!   (`ArtifactNotFound`, `SnapshotNotFound`, `InvalidName`) or the program
//!   itself ran too long (`TimeoutExceeded`)
//! - infrastructure errors: the system could not attempt the request
//!   (see [`AutofixError::is_infrastructure`])
//!
//! Running out of repair attempts is not an error; it is
//! [`LoopStatus::Exhausted`](crate::LoopStatus::Exhausted).

use crate::config::ConfigError;
use autofix_artifact::NameError;
use autofix_sandbox::SandboxError;
use autofix_store::{LedgerError, VersionError};
use autofix_synthesis::SynthesisError;
use std::path::PathBuf;
use std::time::Duration;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum AutofixError {
    /// No live artifact for this project/filename
    #[error("artifact not found: {project}/{filename} ({})", path.display())]
    ArtifactNotFound {
        project: String,
        filename: String,
        path: PathBuf,
    },

    /// No snapshot under this key in this project
    #[error("snapshot not found in project '{project}': {key}")]
    SnapshotNotFound { project: String, key: String },

    /// Generation or repair did not happen
    #[error("synthesis unavailable for {project}/{filename}: {source}")]
    SynthesisUnavailable {
        project: String,
        filename: String,
        #[source]
        source: SynthesisError,
    },

    /// Snapshot could not be stored
    #[error("version write failed for {project}/{filename}: {source}")]
    VersionWriteFailed {
        project: String,
        filename: String,
        #[source]
        source: VersionError,
    },

    /// Snapshots could not be listed or read
    #[error("version read failed for project '{project}': {source}")]
    VersionReadFailed {
        project: String,
        #[source]
        source: VersionError,
    },

    /// Restored content could not be written to the live artifact
    #[error("rollback write failed for {project} ({}): {source}", path.display())]
    RollbackWriteFailed {
        project: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The program exceeded the sandbox wall-clock limit
    #[error("execution of {project}/{filename} exceeded {}s", timeout.as_secs_f64())]
    TimeoutExceeded {
        project: String,
        filename: String,
        timeout: Duration,
    },

    /// History ledger could not be written or read
    #[error("history unavailable for project '{project}': {source}")]
    HistoryUnavailable {
        project: String,
        #[source]
        source: LedgerError,
    },

    /// The sandbox could not run the artifact at all
    #[error("sandbox unavailable for {project}/{filename}: {source}")]
    SandboxUnavailable {
        project: String,
        filename: String,
        #[source]
        source: SandboxError,
    },

    /// Live artifact could not be written
    #[error("failed to write artifact {project}/{filename} ({}): {source}", path.display())]
    ArtifactWriteFailed {
        project: String,
        filename: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Live artifact exists but could not be read
    #[error("failed to read artifact {project}/{filename} ({}): {source}", path.display())]
    ArtifactReadFailed {
        project: String,
        filename: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Project or filename rejected
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AutofixError {
    /// Whether the system could not attempt the request, as opposed to the
    /// request naming something missing or the program misbehaving
    #[inline]
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::SynthesisUnavailable { .. }
                | Self::VersionWriteFailed { .. }
                | Self::VersionReadFailed { .. }
                | Self::RollbackWriteFailed { .. }
                | Self::HistoryUnavailable { .. }
                | Self::SandboxUnavailable { .. }
                | Self::ArtifactWriteFailed { .. }
                | Self::ArtifactReadFailed { .. }
                | Self::Config(_)
        )
    }

    /// Stable machine-readable kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ArtifactNotFound { .. } => "ArtifactNotFound",
            Self::SnapshotNotFound { .. } => "SnapshotNotFound",
            Self::SynthesisUnavailable { .. } => "SynthesisUnavailable",
            Self::VersionWriteFailed { .. } => "VersionWriteFailed",
            Self::VersionReadFailed { .. } => "VersionReadFailed",
            Self::RollbackWriteFailed { .. } => "RollbackWriteFailed",
            Self::TimeoutExceeded { .. } => "TimeoutExceeded",
            Self::HistoryUnavailable { .. } => "HistoryUnavailable",
            Self::SandboxUnavailable { .. } => "SandboxUnavailable",
            Self::ArtifactWriteFailed { .. } => "ArtifactWriteFailed",
            Self::ArtifactReadFailed { .. } => "ArtifactReadFailed",
            Self::InvalidName(_) => "InvalidName",
            Self::Config(_) => "Config",
        }
    }
}
