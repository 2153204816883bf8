//! Execution attempt records
//!
//! One [`ExecutionAttempt`] is written to the history ledger for every
//! sandbox invocation made while generating or correcting an artifact.
//! Records are immutable once appended.

use crate::hash::ContentHash;
use crate::name::{Filename, ProjectName};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Ledger timestamp layout: fixed microsecond precision, `Z` suffix.
///
/// Fixed width keeps string order equal to chronological order, which is
/// what sort-key range queries rely on.
pub const LEDGER_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Truncate to the precision ledger timestamps are stored with
#[inline]
#[must_use]
pub fn ledger_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Render a timestamp as a ledger sort key
#[inline]
#[must_use]
pub fn format_ledger_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(LEDGER_TIMESTAMP_FORMAT).to_string()
}

/// Parse a ledger sort key (any RFC 3339 timestamp is accepted)
///
/// # Errors
/// Returns the chrono parse error for malformed input.
pub fn parse_ledger_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| ts.with_timezone(&Utc))
}

mod ledger_timestamp {
    use super::{format_ledger_timestamp, parse_ledger_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        ts: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_ledger_timestamp(ts))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_ledger_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// One recorded execution of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    /// Partition key
    pub project: ProjectName,
    /// Sort key, unique within the project
    #[serde(with = "ledger_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub filename: Filename,
    /// Natural-language instruction the artifact was generated from
    pub instruction: String,
    /// Source that was executed
    pub source_code: String,
    pub stdout: String,
    pub stderr: String,
    /// Process exit status; `None` when the run hit the sandbox timeout
    #[serde(default)]
    pub exit_status: Option<i32>,
    /// 1-based attempt number within one request
    #[serde(default)]
    pub attempt: u32,
    /// Correlates the attempts of one request
    #[serde(default)]
    pub request_id: String,
    /// Blake3 of `source_code`, hex encoded
    #[serde(default)]
    pub source_hash: String,
}

impl ExecutionAttempt {
    /// Create a record for `source_code`; the ledger assigns the final timestamp
    #[must_use]
    pub fn new(
        project: ProjectName,
        filename: Filename,
        instruction: impl Into<String>,
        source_code: impl Into<String>,
    ) -> Self {
        let source_code = source_code.into();
        Self {
            project,
            timestamp: ledger_precision(Utc::now()),
            filename,
            instruction: instruction.into(),
            source_hash: ContentHash::of_source(&source_code).to_string(),
            source_code,
            stdout: String::new(),
            stderr: String::new(),
            exit_status: None,
            attempt: 0,
            request_id: String::new(),
        }
    }

    /// Attach captured process output
    #[must_use]
    pub fn with_output(
        mut self,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_status: Option<i32>,
    ) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self.exit_status = exit_status;
        self
    }

    /// Attach request correlation
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32, request_id: impl Into<String>) -> Self {
        self.attempt = attempt;
        self.request_id = request_id.into();
        self
    }

    /// Whether the recorded run exited with status 0
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_status == Some(0)
    }

    /// Sort key rendering of [`Self::timestamp`]
    #[inline]
    #[must_use]
    pub fn sort_key(&self) -> String {
        format_ledger_timestamp(&self.timestamp)
    }
}
