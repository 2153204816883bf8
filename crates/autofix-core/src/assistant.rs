//! Code assistant facade
//!
//! One async method per external operation. Every method that writes or
//! executes a live artifact holds that artifact's lock for its whole
//! duration and runs inside a span carrying the project, filename and a
//! per-request id.

use crate::config::AutofixConfig;
use crate::correction::{
    CorrectionLoop, LoopEntry, LoopReport, LoopRequest, LoopStatus, RetryBudget,
};
use crate::error::AutofixError;
use crate::locks::ArtifactLocks;
use crate::rollback::{RestoredArtifact, RollbackManager};
use crate::workspace::Workspace;
use autofix_artifact::{ExecutionAttempt, Filename, ProjectName, SnapshotKey, SnapshotMeta};
use autofix_sandbox::{ProcessSandbox, SandboxError, SandboxExecutor};
use autofix_store::{
    BlobStore, HistoryLedger, HistorySearch, LedgerError, RecordStore, VersionStore,
};
use autofix_synthesis::{GenerativeModel, OpenAiChatModel, SynthesisAdapter, UnavailableModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

/// Result of `generate_code`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub message: String,
    pub file_path: PathBuf,
    pub stdout: String,
    pub stderr: String,
    pub status: LoopStatus,
    pub attempts: u32,
    pub snapshot_key: Option<SnapshotKey>,
    pub request_id: String,
}

/// Result of `run_code`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

/// Result of `auto_fix_code`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoFixResponse {
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    pub status: LoopStatus,
    pub attempts: u32,
    pub exit_status: Option<i32>,
    pub request_id: String,
}

/// Result of `rollback_to_version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResponse {
    pub message: String,
    pub restored_path: PathBuf,
    pub key: SnapshotKey,
    pub filename: Filename,
}

/// Entry point for every operation
pub struct CodeAssistant {
    config: AutofixConfig,
    workspace: Workspace,
    sandbox: Arc<dyn SandboxExecutor>,
    versions: Arc<VersionStore>,
    ledger: Arc<HistoryLedger>,
    correction: CorrectionLoop,
    rollback: RollbackManager,
    locks: ArtifactLocks,
}

impl std::fmt::Debug for CodeAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeAssistant")
            .field("workspace", &self.workspace)
            .field("correction", &self.correction)
            .finish_non_exhaustive()
    }
}

impl CodeAssistant {
    /// Start building from `config`
    #[inline]
    #[must_use]
    pub fn builder(config: AutofixConfig) -> CodeAssistantBuilder {
        CodeAssistantBuilder::new(config)
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AutofixConfig {
        &self.config
    }

    /// Live artifact workspace
    #[inline]
    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Synthesize, snapshot, write and execute a new artifact
    ///
    /// Uses `budget` or the configured generate budget (one execution by
    /// default, so no repair).
    ///
    /// # Errors
    /// Returns [`AutofixError`] on infrastructure failure. A program that
    /// fails to run is reported in the response, not as an error.
    pub async fn generate_code(
        &self,
        project: &ProjectName,
        filename: &Filename,
        instruction: &str,
        budget: Option<RetryBudget>,
    ) -> Result<GenerateResponse, AutofixError> {
        let budget = budget.unwrap_or_else(|| RetryBudget::new(self.config.generate_budget));
        let request = LoopRequest::new(
            project.clone(),
            filename.clone(),
            instruction,
            LoopEntry::Generate,
            budget,
        );
        let span = request_span("generate_code", &request);

        async {
            tracing::info!(instruction_len = instruction.len(), "Generating code");
            let _guard = self.locks.acquire(project, filename).await;
            let report = self.correction.run(&request).await?;

            let message = match report.status {
                LoopStatus::Succeeded => "Code generated and executed successfully".to_string(),
                LoopStatus::Exhausted => format!(
                    "Code generated but execution failed after {} attempt(s)",
                    report.attempts
                ),
            };
            Ok(GenerateResponse {
                message,
                file_path: report.path,
                stdout: report.stdout,
                stderr: report.stderr,
                status: report.status,
                attempts: report.attempts,
                snapshot_key: report.snapshot_key,
                request_id: report.request_id,
            })
        }
        .instrument(span)
        .await
    }

    /// Execute the existing artifact once, without synthesis or history
    ///
    /// # Errors
    /// Returns [`AutofixError::ArtifactNotFound`] if there is no artifact,
    /// [`AutofixError::TimeoutExceeded`] if the run hits the sandbox limit,
    /// and [`AutofixError::SandboxUnavailable`] if it cannot start.
    pub async fn run_code(
        &self,
        project: &ProjectName,
        filename: &Filename,
    ) -> Result<RunResponse, AutofixError> {
        let span = tracing::info_span!(
            "run_code",
            project = %project,
            filename = %filename,
            request_id = %ulid::Ulid::new()
        );

        async {
            let _guard = self.locks.acquire(project, filename).await;
            let path = self.workspace.path(project, filename);
            if !self.workspace.exists(project, filename).await {
                return Err(AutofixError::ArtifactNotFound {
                    project: project.to_string(),
                    filename: filename.to_string(),
                    path,
                });
            }

            let output = self.sandbox.execute(&path).await.map_err(|e| match e {
                SandboxError::TimeoutExceeded { timeout, .. } => AutofixError::TimeoutExceeded {
                    project: project.to_string(),
                    filename: filename.to_string(),
                    timeout,
                },
                SandboxError::ArtifactMissing { path } => AutofixError::ArtifactNotFound {
                    project: project.to_string(),
                    filename: filename.to_string(),
                    path,
                },
                source => AutofixError::SandboxUnavailable {
                    project: project.to_string(),
                    filename: filename.to_string(),
                    source,
                },
            })?;

            tracing::info!(exit_status = output.exit_status, "Code executed");
            Ok(RunResponse {
                stdout: output.stdout,
                stderr: output.stderr,
                exit_status: output.exit_status,
            })
        }
        .instrument(span)
        .await
    }

    /// Current source of the live artifact
    ///
    /// # Errors
    /// Returns [`AutofixError::ArtifactNotFound`] if there is no artifact.
    pub async fn get_code(
        &self,
        project: &ProjectName,
        filename: &Filename,
    ) -> Result<String, AutofixError> {
        self.workspace.read(project, filename).await
    }

    /// Run the correction loop on the existing artifact
    ///
    /// Without an explicit `instruction`, the instruction of the most recent
    /// ledger entry for this file is reused so repairs keep their intent.
    ///
    /// # Errors
    /// Returns [`AutofixError::ArtifactNotFound`] if there is no artifact and
    /// infrastructure errors as they occur. Exhausting the budget is a
    /// normal response.
    pub async fn auto_fix_code(
        &self,
        project: &ProjectName,
        filename: &Filename,
        instruction: Option<&str>,
        budget: Option<RetryBudget>,
    ) -> Result<AutoFixResponse, AutofixError> {
        let budget = budget.unwrap_or_else(|| RetryBudget::new(self.config.retry_budget));
        let mut request = LoopRequest::new(
            project.clone(),
            filename.clone(),
            instruction.unwrap_or_default(),
            LoopEntry::Execute,
            budget,
        );
        let span = request_span("auto_fix_code", &request);

        async {
            let _guard = self.locks.acquire(project, filename).await;
            // Looked up under the lock so a fix queued behind a generate sees its instruction
            if instruction.is_none() {
                request.instruction = self
                    .ledger
                    .latest_for_file(project, filename)
                    .await
                    .map_err(|source| history_unavailable(project, source))?
                    .map(|attempt| attempt.instruction)
                    .unwrap_or_default();
            }
            let report = self.correction.run(&request).await?;
            Ok(fix_response(report))
        }
        .instrument(span)
        .await
    }

    /// Snapshots of `project`, oldest first
    ///
    /// # Errors
    /// Returns [`AutofixError::VersionReadFailed`] if the store fails.
    pub async fn list_versions(
        &self,
        project: &ProjectName,
    ) -> Result<Vec<SnapshotMeta>, AutofixError> {
        self.versions
            .list(project)
            .await
            .map_err(|source| AutofixError::VersionReadFailed {
                project: project.to_string(),
                source,
            })
    }

    /// Restore a snapshot over a live artifact
    ///
    /// `target` defaults to the filename recorded in the key.
    ///
    /// # Errors
    /// Returns [`AutofixError::SnapshotNotFound`] for malformed, unknown or
    /// foreign keys and [`AutofixError::RollbackWriteFailed`] if the
    /// overwrite fails.
    pub async fn rollback_to_version(
        &self,
        project: &ProjectName,
        key: &str,
        target: Option<&Filename>,
    ) -> Result<RollbackResponse, AutofixError> {
        let key = RollbackManager::resolve_key(project, key)?;
        let filename = target.unwrap_or_else(|| key.filename()).clone();
        let span = tracing::info_span!(
            "rollback_to_version",
            project = %project,
            filename = %filename,
            key = %key
        );

        async {
            let _guard = self.locks.acquire(project, &filename).await;
            let RestoredArtifact { key, filename, path, .. } =
                self.rollback.rollback(project, &key, Some(&filename)).await?;

            Ok(RollbackResponse {
                message: format!("Restored {filename} from {key}"),
                restored_path: path,
                key,
                filename,
            })
        }
        .instrument(span)
        .await
    }

    /// Most recent ledger entry of `project`
    ///
    /// # Errors
    /// Returns [`AutofixError::HistoryUnavailable`] if the ledger fails.
    pub async fn latest_history(
        &self,
        project: &ProjectName,
    ) -> Result<Option<ExecutionAttempt>, AutofixError> {
        self.ledger
            .latest(project)
            .await
            .map_err(|source| history_unavailable(project, source))
    }

    /// Ledger entries matching `search`, oldest first
    ///
    /// # Errors
    /// Returns [`AutofixError::HistoryUnavailable`] if the ledger fails.
    pub async fn search_history(
        &self,
        project: &ProjectName,
        search: &HistorySearch,
    ) -> Result<Vec<ExecutionAttempt>, AutofixError> {
        self.ledger
            .search(project, search)
            .await
            .map_err(|source| history_unavailable(project, source))
    }

    /// Ledger entries with `start <= timestamp <= end`, oldest first
    ///
    /// # Errors
    /// Returns [`AutofixError::HistoryUnavailable`] if the ledger fails.
    pub async fn history_range(
        &self,
        project: &ProjectName,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExecutionAttempt>, AutofixError> {
        self.ledger
            .range(project, start, end)
            .await
            .map_err(|source| history_unavailable(project, source))
    }
}

fn request_span(operation: &'static str, request: &LoopRequest) -> tracing::Span {
    tracing::info_span!(
        "request",
        operation,
        project = %request.project,
        filename = %request.filename,
        request_id = %request.request_id
    )
}

fn history_unavailable(project: &ProjectName, source: LedgerError) -> AutofixError {
    AutofixError::HistoryUnavailable {
        project: project.to_string(),
        source,
    }
}

fn fix_response(report: LoopReport) -> AutoFixResponse {
    let message = match (report.status, report.attempts) {
        (LoopStatus::Succeeded, 1) => "Code ran successfully; no fix was needed".to_string(),
        (LoopStatus::Succeeded, n) => format!("Code fixed after {n} attempts"),
        (LoopStatus::Exhausted, n) => format!("Could not fix the code after {n} attempt(s)"),
    };
    AutoFixResponse {
        message,
        stdout: report.stdout,
        stderr: report.stderr,
        status: report.status,
        attempts: report.attempts,
        exit_status: report.exit_status,
        request_id: report.request_id,
    }
}

/// Wires a [`CodeAssistant`]; anything not injected comes from config
pub struct CodeAssistantBuilder {
    config: AutofixConfig,
    model: Option<Arc<dyn GenerativeModel>>,
    sandbox: Option<Arc<dyn SandboxExecutor>>,
    blobs: Option<Arc<dyn BlobStore>>,
    records: Option<Arc<dyn RecordStore>>,
}

impl CodeAssistantBuilder {
    /// Create builder
    #[must_use]
    pub fn new(config: AutofixConfig) -> Self {
        Self {
            config,
            model: None,
            sandbox: None,
            blobs: None,
            records: None,
        }
    }

    /// With generative model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// With sandbox
    #[inline]
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: Arc<dyn SandboxExecutor>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// With snapshot backend
    #[inline]
    #[must_use]
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// With history backend
    #[inline]
    #[must_use]
    pub fn with_record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Validate configuration and assemble
    ///
    /// A model that cannot be configured (e.g. no API key) does not fail the
    /// build; synthesis calls report `SynthesisUnavailable` instead, so
    /// read-only operations keep working.
    ///
    /// # Errors
    /// Returns [`AutofixError::Config`] if the configuration is invalid.
    pub fn build(self) -> Result<CodeAssistant, AutofixError> {
        let config = self.config;
        config.validate()?;

        let model = match self.model {
            Some(model) => model,
            None => match OpenAiChatModel::from_config(&config.model) {
                Ok(model) => Arc::new(model) as Arc<dyn GenerativeModel>,
                Err(e) => {
                    tracing::warn!(error = %e, "Generative model unavailable");
                    Arc::new(UnavailableModel::new(e.to_string())) as Arc<dyn GenerativeModel>
                }
            },
        };
        let sandbox = self.sandbox.unwrap_or_else(|| {
            Arc::new(ProcessSandbox::from_config(&config.sandbox)) as Arc<dyn SandboxExecutor>
        });
        let blobs = self.blobs.unwrap_or_else(|| config.storage.blob_store());
        let records = self.records.unwrap_or_else(|| config.storage.record_store());

        let workspace = Workspace::new(&config.workspace_root);
        let versions = Arc::new(VersionStore::new(blobs));
        let ledger = Arc::new(HistoryLedger::new(records));
        let synthesis =
            SynthesisAdapter::new(model).with_call_timeout(config.model.request_timeout());

        let correction = CorrectionLoop::new(
            synthesis,
            Arc::clone(&sandbox),
            Arc::clone(&versions),
            Arc::clone(&ledger),
            workspace.clone(),
        )
        .with_snapshot_repairs(config.snapshot_repairs);
        let rollback = RollbackManager::new(Arc::clone(&versions), workspace.clone());

        tracing::info!(
            workspace = %workspace.root().display(),
            storage = ?config.storage.backend,
            interpreter = %config.sandbox.interpreter,
            "Code assistant ready"
        );

        Ok(CodeAssistant {
            config,
            workspace,
            sandbox,
            versions,
            ledger,
            correction,
            rollback,
            locks: ArtifactLocks::new(),
        })
    }
}
