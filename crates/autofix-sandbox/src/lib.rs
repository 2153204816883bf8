//! Autofix Sandbox
//!
//! Executes generated artifacts as child processes with a wall-clock limit
//! and captures stdout, stderr and the exit status.
//!
//! Retry policy does not live here: one call is one execution. The
//! correction loop decides what a failed or timed-out run means.
//!
//! # Example
//!
//! ```rust,ignore
//! use autofix_sandbox::{ProcessSandbox, SandboxExecutor};
//! use std::time::Duration;
//!
//! let sandbox = ProcessSandbox::new("python3").with_timeout(Duration::from_secs(10));
//! let output = sandbox.execute(Path::new("workspaces/demo/main.py")).await?;
//! println!("exit={} stdout={}", output.exit_status, output.stdout);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod process;

pub use config::{SandboxConfig, DEFAULT_INTERPRETER, DEFAULT_TIMEOUT_SECS};
pub use error::SandboxError;
pub use executor::{ExecutionOutput, SandboxExecutor};
pub use process::ProcessSandbox;
