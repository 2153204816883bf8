//! Sandbox executor capability
//!
//! The correction loop only sees this trait; the subprocess implementation
//! lives in [`crate::process`] and tests substitute scripted fakes.

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runs one artifact and captures what it printed
///
/// Implementations perform no retries and do not interpret the output.
#[async_trait::async_trait]
pub trait SandboxExecutor: Send + Sync {
    /// Execute the artifact at `artifact`
    ///
    /// # Errors
    /// - `SandboxError::TimeoutExceeded` if the wall-clock limit is hit
    /// - `SandboxError::ArtifactMissing` if the file does not exist
    /// - `SandboxError::Spawn` / `SandboxError::Io` if the process could not run
    async fn execute(&self, artifact: &Path) -> Result<ExecutionOutput, SandboxError>;

    /// Wall-clock limit applied to each execution
    fn timeout(&self) -> Duration;
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status; `-1` when the process was terminated by a signal
    pub exit_status: i32,
    /// Wall-clock time spent
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl ExecutionOutput {
    /// Create output record
    #[inline]
    #[must_use]
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_status: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status,
            elapsed: Duration::ZERO,
        }
    }

    /// With elapsed time
    #[inline]
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Exit status 0
    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_exit_zero_only() {
        assert!(ExecutionOutput::new("ok\n", "", 0).success());
        assert!(!ExecutionOutput::new("", "Traceback", 1).success());
        assert!(!ExecutionOutput::new("", "", -1).success());
    }
}
