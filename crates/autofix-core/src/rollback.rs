//! Restore a live artifact from a snapshot

use crate::error::AutofixError;
use crate::workspace::Workspace;
use autofix_artifact::{Filename, ProjectName, SnapshotKey};
use autofix_store::{VersionError, VersionStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Result of a rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredArtifact {
    pub key: SnapshotKey,
    /// Filename that was overwritten
    pub filename: Filename,
    pub path: PathBuf,
    pub size: u64,
}

/// Reads snapshots and overwrites live artifacts with them
pub struct RollbackManager {
    versions: Arc<VersionStore>,
    workspace: Workspace,
}

impl std::fmt::Debug for RollbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackManager")
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}

impl RollbackManager {
    /// Create manager
    #[must_use]
    pub fn new(versions: Arc<VersionStore>, workspace: Workspace) -> Self {
        Self { versions, workspace }
    }

    /// Parse `key` and check it belongs to `project`
    ///
    /// # Errors
    /// Returns [`AutofixError::SnapshotNotFound`] for malformed keys and keys
    /// of other projects.
    pub fn resolve_key(project: &ProjectName, key: &str) -> Result<SnapshotKey, AutofixError> {
        let not_found = || AutofixError::SnapshotNotFound {
            project: project.to_string(),
            key: key.to_string(),
        };
        let parsed: SnapshotKey = key.parse().map_err(|e| {
            tracing::warn!(key, error = %e, "Malformed snapshot key");
            not_found()
        })?;
        if parsed.project() != project {
            return Err(not_found());
        }
        Ok(parsed)
    }

    /// Overwrite the live artifact with the snapshot under `key`
    ///
    /// `target` names the live file to overwrite; when `None` it is the
    /// filename recorded in the key. The caller must hold the target's lock.
    ///
    /// # Errors
    /// Returns [`AutofixError::SnapshotNotFound`] if the key is unknown,
    /// [`AutofixError::VersionReadFailed`] if the store fails, and
    /// [`AutofixError::RollbackWriteFailed`] if the overwrite fails.
    pub async fn rollback(
        &self,
        project: &ProjectName,
        key: &SnapshotKey,
        target: Option<&Filename>,
    ) -> Result<RestoredArtifact, AutofixError> {
        if key.project() != project {
            return Err(AutofixError::SnapshotNotFound {
                project: project.to_string(),
                key: key.to_string(),
            });
        }

        let content = self.versions.get(key).await.map_err(|e| match e {
            VersionError::NotFound { key } => AutofixError::SnapshotNotFound {
                project: project.to_string(),
                key,
            },
            source => AutofixError::VersionReadFailed {
                project: project.to_string(),
                source,
            },
        })?;

        let filename = target.unwrap_or_else(|| key.filename()).clone();
        let path = self
            .workspace
            .write(project, &filename, &content)
            .await
            .map_err(|(path, source)| {
                tracing::error!(path = %path.display(), error = %source, "Rollback write failed");
                AutofixError::RollbackWriteFailed {
                    project: project.to_string(),
                    path,
                    source,
                }
            })?;

        tracing::info!(%key, path = %path.display(), "Artifact restored");
        Ok(RestoredArtifact {
            key: key.clone(),
            filename,
            path,
            size: content.len() as u64,
        })
    }
}
