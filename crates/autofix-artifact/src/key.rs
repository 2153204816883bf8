//! Snapshot keys
//!
//! A [`SnapshotKey`] addresses one immutable copy of an artifact in the
//! version store. The rendered form is
//! `project/YYYY-MM-DD_HH-MM-SS_filename`: the fixed-width timestamp makes
//! lexicographic key order chronological within a project.

use crate::name::{Filename, NameError, ProjectName};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Timestamp layout embedded in snapshot keys (second resolution)
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

const KEY_TIMESTAMP_LEN: usize = 19;

/// Errors when parsing a snapshot key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// No `project/` prefix
    #[error("snapshot key '{0}' has no project prefix")]
    MissingProject(String),

    /// Timestamp segment is missing or malformed
    #[error("snapshot key '{0}' has a malformed timestamp")]
    MalformedTimestamp(String),

    /// Nothing after the timestamp
    #[error("snapshot key '{0}' has no filename")]
    MissingFilename(String),

    /// Project or file segment failed validation
    #[error("snapshot key segment is invalid: {0}")]
    InvalidName(#[from] NameError),
}

/// Key of a stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotKey {
    project: ProjectName,
    captured_at: NaiveDateTime,
    filename: Filename,
}

impl SnapshotKey {
    /// Create a key; sub-second precision is dropped
    #[must_use]
    pub fn new(project: ProjectName, captured_at: NaiveDateTime, filename: Filename) -> Self {
        let captured_at = captured_at.with_nanosecond(0).unwrap_or(captured_at);
        Self {
            project,
            captured_at,
            filename,
        }
    }

    /// Listing prefix shared by every key of `project`
    #[inline]
    #[must_use]
    pub fn prefix(project: &ProjectName) -> String {
        format!("{project}/")
    }

    /// Owning project
    #[inline]
    #[must_use]
    pub fn project(&self) -> &ProjectName {
        &self.project
    }

    /// Capture time (UTC, whole seconds)
    #[inline]
    #[must_use]
    pub fn captured_at(&self) -> NaiveDateTime {
        self.captured_at
    }

    /// Filename recorded at capture time
    #[inline]
    #[must_use]
    pub fn filename(&self) -> &Filename {
        &self.filename
    }
}

impl Display for SnapshotKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}_{}",
            self.project,
            self.captured_at.format(KEY_TIMESTAMP_FORMAT),
            self.filename
        )
    }
}

impl FromStr for SnapshotKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (project, rest) = s
            .split_once('/')
            .ok_or_else(|| KeyError::MissingProject(s.to_string()))?;
        let project = ProjectName::new(project)?;

        let timestamp = rest
            .get(..KEY_TIMESTAMP_LEN)
            .ok_or_else(|| KeyError::MalformedTimestamp(s.to_string()))?;
        let captured_at = NaiveDateTime::parse_from_str(timestamp, KEY_TIMESTAMP_FORMAT)
            .map_err(|_| KeyError::MalformedTimestamp(s.to_string()))?;

        let filename = rest
            .get(KEY_TIMESTAMP_LEN..)
            .and_then(|tail| tail.strip_prefix('_'))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| KeyError::MissingFilename(s.to_string()))?;

        Ok(Self {
            project,
            captured_at,
            filename: Filename::new(filename)?,
        })
    }
}

impl TryFrom<String> for SnapshotKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SnapshotKey> for String {
    fn from(value: SnapshotKey) -> Self {
        value.to_string()
    }
}

/// Listing entry for a stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Snapshot key
    pub key: SnapshotKey,
    /// Capture time (UTC, whole seconds)
    pub captured_at: NaiveDateTime,
    /// Filename recorded at capture time
    pub filename: Filename,
    /// Stored content size in bytes
    pub size: u64,
}

impl SnapshotMeta {
    /// Build from a key and its stored size
    #[must_use]
    pub fn new(key: SnapshotKey, size: u64) -> Self {
        Self {
            captured_at: key.captured_at(),
            filename: key.filename().clone(),
            key,
            size,
        }
    }
}
