//! Correction loop
//!
//! ```text
//! Generating ──► Executing ──► Succeeded
//!                  ▲   │
//!                  │   ├──► Exhausted   (attempts == budget)
//!                  │   ▼
//!                Repairing
//! ```
//!
//! Every pass through `Executing` is one sandbox invocation and one ledger
//! record. The budget bounds invocations per call; nothing carries over
//! between calls.

use crate::error::AutofixError;
use crate::workspace::Workspace;
use autofix_artifact::{ContentHash, ExecutionAttempt, Filename, ProjectName, SnapshotKey};
use autofix_sandbox::{SandboxError, SandboxExecutor};
use autofix_store::{HistoryLedger, VersionStore};
use autofix_synthesis::{SynthesisAdapter, SynthesisError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Generating,
    Executing,
    Repairing,
    Succeeded,
    Exhausted,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generating => "generating",
            Self::Executing => "executing",
            Self::Repairing => "repairing",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// Where the loop starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEntry {
    /// Synthesize a fresh artifact first
    Generate,
    /// Execute the existing artifact
    Execute,
}

/// Maximum sandbox invocations for one request (at least 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBudget(u32);

impl RetryBudget {
    /// Default budget for auto-fix requests
    pub const DEFAULT: Self = Self(3);

    /// Budget of `max_attempts`, raised to 1 if zero
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self(max_attempts.max(1))
    }

    /// Maximum invocations
    #[inline]
    #[must_use]
    pub fn max_attempts(self) -> u32 {
        self.0
    }

    /// Whether `attempts` invocations use up the budget
    #[inline]
    #[must_use]
    pub fn is_spent(self, attempts: u32) -> bool {
        attempts >= self.0
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Terminal outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopStatus {
    /// Last execution exited 0
    Succeeded,
    /// Budget spent without a successful execution
    Exhausted,
}

impl LoopStatus {
    /// Whether the artifact ran successfully
    #[inline]
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// One loop invocation
#[derive(Debug, Clone)]
pub struct LoopRequest {
    pub project: ProjectName,
    pub filename: Filename,
    /// Instruction recorded with every attempt and passed to repairs
    pub instruction: String,
    pub entry: LoopEntry,
    pub budget: RetryBudget,
    /// Correlates the attempts of this request in logs and the ledger
    pub request_id: String,
}

impl LoopRequest {
    /// Create request with a fresh request id
    #[must_use]
    pub fn new(
        project: ProjectName,
        filename: Filename,
        instruction: impl Into<String>,
        entry: LoopEntry,
        budget: RetryBudget,
    ) -> Self {
        Self {
            project,
            filename,
            instruction: instruction.into(),
            entry,
            budget,
            request_id: ulid::Ulid::new().to_string(),
        }
    }
}

/// What the loop did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopReport {
    pub status: LoopStatus,
    /// Sandbox invocations performed
    pub attempts: u32,
    /// Output of the last invocation
    pub stdout: String,
    pub stderr: String,
    /// `None` when the last invocation timed out
    pub exit_status: Option<i32>,
    /// Most recent snapshot taken by this request
    pub snapshot_key: Option<SnapshotKey>,
    /// Live artifact path
    pub path: PathBuf,
    /// Source as last executed
    pub source: String,
    pub request_id: String,
}

/// Captured result of one sandbox invocation
#[derive(Debug)]
struct RunOutcome {
    stdout: String,
    stderr: String,
    exit_status: Option<i32>,
}

impl RunOutcome {
    fn succeeded(&self) -> bool {
        self.exit_status == Some(0)
    }

    /// What a repair should look at
    fn error_trace(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Generate/execute/repair state machine
pub struct CorrectionLoop {
    synthesis: SynthesisAdapter,
    sandbox: Arc<dyn SandboxExecutor>,
    versions: Arc<VersionStore>,
    ledger: Arc<HistoryLedger>,
    workspace: Workspace,
    snapshot_repairs: bool,
}

impl fmt::Debug for CorrectionLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectionLoop")
            .field("synthesis", &self.synthesis)
            .field("workspace", &self.workspace)
            .field("snapshot_repairs", &self.snapshot_repairs)
            .finish_non_exhaustive()
    }
}

impl CorrectionLoop {
    /// Create loop over its collaborators
    #[must_use]
    pub fn new(
        synthesis: SynthesisAdapter,
        sandbox: Arc<dyn SandboxExecutor>,
        versions: Arc<VersionStore>,
        ledger: Arc<HistoryLedger>,
        workspace: Workspace,
    ) -> Self {
        Self {
            synthesis,
            sandbox,
            versions,
            ledger,
            workspace,
            snapshot_repairs: false,
        }
    }

    /// Also snapshot every repaired source
    #[inline]
    #[must_use]
    pub fn with_snapshot_repairs(mut self, enabled: bool) -> Self {
        self.snapshot_repairs = enabled;
        self
    }

    /// Run to `Succeeded` or `Exhausted`
    ///
    /// The caller must hold the artifact's lock.
    ///
    /// # Errors
    /// Infrastructure failures abort the loop immediately; so does a missing
    /// artifact on [`LoopEntry::Execute`]. Running out of attempts is
    /// reported through [`LoopStatus::Exhausted`], not as an error.
    pub async fn run(&self, request: &LoopRequest) -> Result<LoopReport, AutofixError> {
        let project = &request.project;
        let filename = &request.filename;
        let mut snapshot_key = None;

        let mut state = match request.entry {
            LoopEntry::Generate => LoopState::Generating,
            LoopEntry::Execute => LoopState::Executing,
        };
        tracing::info!(%state, budget = request.budget.max_attempts(), "Correction loop started");

        let (mut source, path) = match request.entry {
            LoopEntry::Generate => {
                let source = self
                    .synthesis
                    .synthesize(&request.instruction)
                    .await
                    .map_err(|e| synthesis_failed(request, e))?;
                // Snapshot before touching the live file so a failed snapshot
                // leaves the previous artifact in place
                snapshot_key = Some(self.snapshot(request, &source).await?);
                let path = self.workspace.write_artifact(project, filename, &source).await?;
                state = transition(state, LoopState::Executing);
                (source, path)
            }
            LoopEntry::Execute => {
                let source = self.workspace.read(project, filename).await?;
                (source, self.workspace.path(project, filename))
            }
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self.execute(request, &path).await?;
            self.record(request, &source, &outcome, attempts).await?;

            if outcome.succeeded() {
                transition(state, LoopState::Succeeded);
                return Ok(Self::report(
                    request,
                    LoopStatus::Succeeded,
                    attempts,
                    outcome,
                    snapshot_key,
                    path,
                    source,
                ));
            }

            tracing::warn!(
                attempt = attempts,
                exit_status = ?outcome.exit_status,
                stderr_len = outcome.stderr.len(),
                "Execution failed"
            );

            if request.budget.is_spent(attempts) {
                transition(state, LoopState::Exhausted);
                return Ok(Self::report(
                    request,
                    LoopStatus::Exhausted,
                    attempts,
                    outcome,
                    snapshot_key,
                    path,
                    source,
                ));
            }

            state = transition(state, LoopState::Repairing);
            let repaired = self
                .synthesis
                .repair(&request.instruction, &source, outcome.error_trace())
                .await
                .map_err(|e| synthesis_failed(request, e))?;

            // Unchanged source is re-executed but neither rewritten nor snapshotted
            if ContentHash::of_source(&repaired) == ContentHash::of_source(&source) {
                tracing::warn!(attempt = attempts, "Repair returned identical source");
            } else {
                if self.snapshot_repairs {
                    snapshot_key = Some(self.snapshot(request, &repaired).await?);
                }
                self.workspace.write_artifact(project, filename, &repaired).await?;
                source = repaired;
            }
            state = transition(state, LoopState::Executing);
        }
    }

    async fn execute(
        &self,
        request: &LoopRequest,
        path: &Path,
    ) -> Result<RunOutcome, AutofixError> {
        match self.sandbox.execute(path).await {
            Ok(output) => Ok(RunOutcome {
                stdout: output.stdout,
                stderr: output.stderr,
                exit_status: Some(output.exit_status),
            }),
            // A hung program is a failed attempt, not a broken system
            Err(err @ SandboxError::TimeoutExceeded { .. }) => Ok(RunOutcome {
                stdout: String::new(),
                stderr: err.to_string(),
                exit_status: None,
            }),
            Err(SandboxError::ArtifactMissing { path }) => Err(AutofixError::ArtifactNotFound {
                project: request.project.to_string(),
                filename: request.filename.to_string(),
                path,
            }),
            Err(source) => {
                tracing::error!(error = %source, "Sandbox could not run artifact");
                Err(AutofixError::SandboxUnavailable {
                    project: request.project.to_string(),
                    filename: request.filename.to_string(),
                    source,
                })
            }
        }
    }

    async fn record(
        &self,
        request: &LoopRequest,
        source: &str,
        outcome: &RunOutcome,
        attempt: u32,
    ) -> Result<(), AutofixError> {
        let record = ExecutionAttempt::new(
            request.project.clone(),
            request.filename.clone(),
            request.instruction.clone(),
            source,
        )
        .with_output(outcome.stdout.clone(), outcome.stderr.clone(), outcome.exit_status)
        .with_attempt(attempt, request.request_id.clone());

        self.ledger
            .append(record)
            .await
            .map(|_| ())
            .map_err(|source| AutofixError::HistoryUnavailable {
                project: request.project.to_string(),
                source,
            })
    }

    async fn snapshot(
        &self,
        request: &LoopRequest,
        content: &str,
    ) -> Result<SnapshotKey, AutofixError> {
        self.versions
            .put(&request.project, &request.filename, content)
            .await
            .map_err(|source| AutofixError::VersionWriteFailed {
                project: request.project.to_string(),
                filename: request.filename.to_string(),
                source,
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        request: &LoopRequest,
        status: LoopStatus,
        attempts: u32,
        outcome: RunOutcome,
        snapshot_key: Option<SnapshotKey>,
        path: PathBuf,
        source: String,
    ) -> LoopReport {
        tracing::info!(?status, attempts, "Correction loop finished");
        LoopReport {
            status,
            attempts,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_status: outcome.exit_status,
            snapshot_key,
            path,
            source,
            request_id: request.request_id.clone(),
        }
    }
}

fn transition(from: LoopState, to: LoopState) -> LoopState {
    tracing::debug!(%from, %to, "Loop transition");
    to
}

fn synthesis_failed(request: &LoopRequest, source: SynthesisError) -> AutofixError {
    tracing::error!(error = %source, "Synthesis failed");
    AutofixError::SynthesisUnavailable {
        project: request.project.to_string(),
        filename: request.filename.to_string(),
        source,
    }
}
