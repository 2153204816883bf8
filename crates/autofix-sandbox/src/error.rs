//! Sandbox errors

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while executing an artifact
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Artifact file does not exist
    #[error("artifact not found: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// Interpreter could not be started
    #[error("failed to spawn interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    /// Wall-clock limit hit; the child was killed and its output discarded
    #[error("execution of {} exceeded {}s timeout", path.display(), timeout.as_secs_f64())]
    TimeoutExceeded { path: PathBuf, timeout: Duration },

    /// IO failure while inspecting the artifact or collecting output
    #[error("io error running {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SandboxError {
    /// Whether the program itself ran too long (as opposed to the sandbox
    /// failing to run it at all)
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_limit() {
        let err = SandboxError::TimeoutExceeded {
            path: PathBuf::from("/w/demo/main.py"),
            timeout: Duration::from_secs(10),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("10s"));
        assert!(err.to_string().contains("main.py"));
    }
}
