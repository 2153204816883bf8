//! Validated project and file names
//!
//! Both names end up as path components under the workspace root and as
//! segments of snapshot keys, so they are restricted to a conservative
//! character set: ASCII alphanumerics, `-`, `_` and `.`, never starting
//! with a dot.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Maximum name length in bytes
pub const MAX_NAME_LEN: usize = 128;

/// Project used when a caller names none
pub const DEFAULT_PROJECT: &str = "default_project";

/// Artifact filename used when a caller names none
pub const PRIMARY_FILENAME: &str = "main.py";

/// Errors when validating a name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// Name is empty
    #[error("{kind} name is empty")]
    Empty { kind: &'static str },

    /// Name is longer than [`MAX_NAME_LEN`]
    #[error("{kind} name is {len} bytes long (max: {max})")]
    TooLong {
        kind: &'static str,
        len: usize,
        max: usize,
    },

    /// Name contains a character outside the allowed set
    #[error("{kind} name '{name}' contains invalid character {ch:?}")]
    InvalidChar {
        kind: &'static str,
        name: String,
        ch: char,
    },

    /// Name starts with a dot
    #[error("{kind} name '{name}' must not start with '.'")]
    LeadingDot { kind: &'static str, name: String },
}

fn validate(kind: &'static str, name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty { kind });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong {
            kind,
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(NameError::InvalidChar {
            kind,
            name: name.to_string(),
            ch,
        });
    }
    // Also rules out "." and ".."
    if name.starts_with('.') {
        return Err(NameError::LeadingDot {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Name of a project namespace
///
/// Projects are created implicitly on first use and own one live artifact
/// per filename plus their snapshots and ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    /// Validate and wrap a project name
    ///
    /// # Errors
    /// Returns [`NameError`] if the name is empty, too long, or contains
    /// characters that are unsafe as a path component.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate("project", &name)?;
        Ok(Self(name))
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectName {
    fn default() -> Self {
        Self(DEFAULT_PROJECT.to_string())
    }
}

impl Display for ProjectName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProjectName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectName> for String {
    fn from(value: ProjectName) -> Self {
        value.0
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of an artifact file within a project
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Filename(String);

impl Filename {
    /// Validate and wrap a filename
    ///
    /// # Errors
    /// Returns [`NameError`] for empty, oversized, hidden, or
    /// path-separator-containing names.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate("file", &name)?;
        Ok(Self(name))
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Filename {
    fn default() -> Self {
        Self(PRIMARY_FILENAME.to_string())
    }
}

impl Display for Filename {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Filename {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Filename {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Filename> for String {
    fn from(value: Filename) -> Self {
        value.0
    }
}

impl AsRef<str> for Filename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
