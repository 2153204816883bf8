//! Subprocess sandbox
//!
//! Runs an artifact as `interpreter [args..] <file>` with the artifact's
//! directory as working directory. This is process-level separation with a
//! wall-clock limit, not a hardened jail: the program can still perform any
//! I/O its user is allowed to.

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::executor::{ExecutionOutput, SandboxExecutor};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Subprocess-backed [`SandboxExecutor`]
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    interpreter: String,
    args: Vec<String>,
    timeout: Duration,
    clear_env: bool,
}

impl ProcessSandbox {
    /// Create a sandbox for `interpreter` with the default timeout
    #[inline]
    #[must_use]
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self::from_config(&SandboxConfig::new().with_interpreter(interpreter))
    }

    /// Create from configuration
    #[must_use]
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
            clear_env: config.clear_env,
        }
    }

    /// With wall-clock limit
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With interpreter arguments
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Interpreter binary
    #[inline]
    #[must_use]
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn command(&self, artifact: &Path) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.args);

        // The working directory becomes the artifact's directory, so the
        // artifact is addressed by its bare file name from there.
        match (
            artifact.parent().filter(|p| !p.as_os_str().is_empty()),
            artifact.file_name(),
        ) {
            (Some(dir), Some(name)) => {
                cmd.current_dir(dir);
                cmd.arg(name);
            }
            _ => {
                cmd.arg(artifact);
            }
        }

        if self.clear_env {
            let path = std::env::var_os("PATH");
            cmd.env_clear();
            if let Some(path) = path {
                cmd.env("PATH", path);
            }
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait::async_trait]
impl SandboxExecutor for ProcessSandbox {
    async fn execute(&self, artifact: &Path) -> Result<ExecutionOutput, SandboxError> {
        match tokio::fs::metadata(artifact).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(SandboxError::ArtifactMissing {
                    path: artifact.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SandboxError::ArtifactMissing {
                    path: artifact.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(SandboxError::Io {
                    path: artifact.to_path_buf(),
                    source,
                })
            }
        }

        tracing::debug!(
            interpreter = %self.interpreter,
            artifact = %artifact.display(),
            timeout_secs = self.timeout.as_secs_f64(),
            "Spawning sandboxed process"
        );

        let started = Instant::now();
        let child = self
            .command(artifact)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                interpreter: self.interpreter.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, and
        // kill_on_drop terminates it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let elapsed = started.elapsed();
                let exit_status = output.status.code().unwrap_or(-1);
                tracing::debug!(
                    exit_status,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    stdout_bytes = output.stdout.len(),
                    stderr_bytes = output.stderr.len(),
                    "Sandboxed process finished"
                );
                Ok(ExecutionOutput::new(
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr),
                    exit_status,
                )
                .with_elapsed(elapsed))
            }
            Ok(Err(source)) => Err(SandboxError::Io {
                path: artifact.to_path_buf(),
                source,
            }),
            Err(_) => {
                tracing::warn!(
                    artifact = %artifact.display(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Sandboxed process timed out"
                );
                Err(SandboxError::TimeoutExceeded {
                    path: artifact.to_path_buf(),
                    timeout: self.timeout,
                })
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
