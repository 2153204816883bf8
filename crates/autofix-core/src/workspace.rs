//! Live artifacts on disk

use crate::error::AutofixError;
use autofix_artifact::{Filename, ProjectName};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Directory tree holding one live artifact per `(project, filename)`
///
/// Writes are atomic: content lands in a hidden temp file next to the target
/// and is renamed over it.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create workspace rooted at `root`
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project directory
    #[must_use]
    pub fn project_dir(&self, project: &ProjectName) -> PathBuf {
        self.root.join(project.as_str())
    }

    /// Path of the live artifact
    #[must_use]
    pub fn path(&self, project: &ProjectName, filename: &Filename) -> PathBuf {
        self.project_dir(project).join(filename.as_str())
    }

    /// Whether the live artifact exists
    pub async fn exists(&self, project: &ProjectName, filename: &Filename) -> bool {
        fs::metadata(self.path(project, filename))
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Read the live artifact
    ///
    /// # Errors
    /// Returns [`AutofixError::ArtifactNotFound`] if it does not exist and
    /// [`AutofixError::ArtifactReadFailed`] for other I/O failures.
    pub async fn read(
        &self,
        project: &ProjectName,
        filename: &Filename,
    ) -> Result<String, AutofixError> {
        let path = self.path(project, filename);
        match fs::read_to_string(&path).await {
            Ok(source) => Ok(source),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AutofixError::ArtifactNotFound {
                project: project.to_string(),
                filename: filename.to_string(),
                path,
            }),
            Err(source) => Err(AutofixError::ArtifactReadFailed {
                project: project.to_string(),
                filename: filename.to_string(),
                path,
                source,
            }),
        }
    }

    /// Replace the live artifact with `content`, creating the project
    /// directory on first use
    ///
    /// # Errors
    /// Returns the underlying I/O error with the path it occurred at; callers
    /// decide which taxonomy variant it becomes.
    pub async fn write(
        &self,
        project: &ProjectName,
        filename: &Filename,
        content: &str,
    ) -> Result<PathBuf, (PathBuf, std::io::Error)> {
        let dir = self.project_dir(project);
        fs::create_dir_all(&dir).await.map_err(|e| (dir.clone(), e))?;

        let target = dir.join(filename.as_str());
        let tmp = dir.join(format!(".{}.{}.tmp", filename, ulid::Ulid::new()));
        if let Err(e) = fs::write(&tmp, content).await {
            let _ = fs::remove_file(&tmp).await;
            return Err((tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err((target, e));
        }

        tracing::debug!(path = %target.display(), size = content.len(), "Artifact written");
        Ok(target)
    }

    /// [`Self::write`] mapped to [`AutofixError::ArtifactWriteFailed`]
    ///
    /// # Errors
    /// See [`Self::write`].
    pub async fn write_artifact(
        &self,
        project: &ProjectName,
        filename: &Filename,
        content: &str,
    ) -> Result<PathBuf, AutofixError> {
        self.write(project, filename, content)
            .await
            .map_err(|(path, source)| {
                tracing::error!(path = %path.display(), error = %source, "Artifact write failed");
                AutofixError::ArtifactWriteFailed {
                    project: project.to_string(),
                    filename: filename.to_string(),
                    path,
                    source,
                }
            })
    }
}
