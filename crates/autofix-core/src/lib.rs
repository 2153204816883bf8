//! Autofix Core
//!
//! Composes synthesis, sandboxed execution and the two stores into the
//! bounded generate → execute → repair cycle:
//! - [`CorrectionLoop`]: the state machine, one sandbox run and one ledger
//!   record per attempt, bounded by a per-call [`RetryBudget`]
//! - [`RollbackManager`]: restores a live artifact from a snapshot
//! - [`CodeAssistant`]: one method per external operation, with
//!   per-artifact locking and request-scoped tracing spans
//!
//! # Example
//!
//! ```rust,ignore
//! use autofix_core::{AutofixConfig, CodeAssistant};
//!
//! # async fn example() -> Result<(), autofix_core::AutofixError> {
//! let assistant = CodeAssistant::builder(AutofixConfig::load(None)?).build()?;
//! let project = "demo".parse()?;
//! let filename = "main.py".parse()?;
//!
//! let generated = assistant
//!     .generate_code(&project, &filename, "print the first ten primes", None)
//!     .await?;
//! println!("{}", generated.stdout);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod assistant;
pub mod config;
pub mod correction;
pub mod error;
pub mod locks;
pub mod rollback;
pub mod workspace;

pub use assistant::{
    AutoFixResponse, CodeAssistant, CodeAssistantBuilder, GenerateResponse, RollbackResponse,
    RunResponse,
};
pub use config::{AutofixConfig, ConfigError};
pub use correction::{
    CorrectionLoop, LoopEntry, LoopReport, LoopRequest, LoopState, LoopStatus, RetryBudget,
};
pub use error::AutofixError;
pub use locks::{ArtifactGuard, ArtifactLocks};
pub use rollback::{RestoredArtifact, RollbackManager};
pub use workspace::Workspace;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
