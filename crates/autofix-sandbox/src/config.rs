//! Sandbox configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interpreter used to run generated artifacts
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Default wall-clock limit per execution
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// How generated artifacts are executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter binary, resolved through `PATH`
    pub interpreter: String,
    /// Extra interpreter arguments placed before the artifact path
    pub args: Vec<String>,
    /// Wall-clock limit per execution
    pub timeout_secs: u64,
    /// Start the child with an empty environment (PATH is kept)
    pub clear_env: bool,
}

impl SandboxConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With interpreter
    #[inline]
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// With timeout in seconds
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            clear_env: false,
        }
    }
}
