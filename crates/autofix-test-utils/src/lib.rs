//! Testing utilities for the autofix workspace
//!
//! Deterministic stand-ins for every injected capability plus a harness
//! that wires them into a [`CodeAssistant`] over a temp directory.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use autofix_artifact::{Filename, ProjectName};
use autofix_core::{AutofixConfig, CodeAssistant};
use autofix_sandbox::{ExecutionOutput, SandboxError, SandboxExecutor};
use autofix_store::{
    BlobEntry, BlobStore, MemoryBlobStore, MemoryRecordStore, Record, RecordQuery, RecordStore,
    StorageConfig, StoreError,
};
use autofix_synthesis::{CompletionRequest, GenerativeModel, ModelError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub fn project(name: &str) -> ProjectName {
    ProjectName::new(name).unwrap()
}

pub fn filename(name: &str) -> Filename {
    Filename::new(name).unwrap()
}

/// Pops scripted replies in order; the last one repeats once the script runs out
#[derive(Debug)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    last: Mutex<Option<Result<String, ModelError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Same source for every call
    pub fn always(source: &str) -> Arc<Self> {
        Self::new(vec![Ok(source.to_string())])
    }

    /// These sources in order
    pub fn sequence(sources: &[&str]) -> Arc<Self> {
        Self::new(sources.iter().map(|s| Ok((*s).to_string())).collect())
    }

    /// Every call fails with `error`
    pub fn failing(error: ModelError) -> Arc<Self> {
        Self::new(vec![Err(error)])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl GenerativeModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        self.requests.lock().push(request.clone());
        let next = self.replies.lock().pop_front();
        let mut last = self.last.lock();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("script is empty".into())))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// One scripted sandbox result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRun {
    Exit {
        stdout: String,
        stderr: String,
        status: i32,
    },
    Timeout,
    SpawnFailure,
}

impl ScriptedRun {
    pub fn ok(stdout: &str) -> Self {
        Self::Exit {
            stdout: stdout.to_string(),
            stderr: String::new(),
            status: 0,
        }
    }

    pub fn fail(stderr: &str) -> Self {
        Self::Exit {
            stdout: String::new(),
            stderr: stderr.to_string(),
            status: 1,
        }
    }
}

/// Pops scripted runs in order (last repeats) and records what it executed
#[derive(Debug)]
pub struct ScriptedSandbox {
    runs: Mutex<VecDeque<ScriptedRun>>,
    last: Mutex<Option<ScriptedRun>>,
    executed: Mutex<Vec<(PathBuf, String)>>,
    timeout: Duration,
}

impl ScriptedSandbox {
    pub fn new(runs: Vec<ScriptedRun>) -> Arc<Self> {
        Arc::new(Self {
            runs: Mutex::new(runs.into()),
            last: Mutex::new(None),
            executed: Mutex::new(Vec::new()),
            timeout: Duration::from_secs(10),
        })
    }

    pub fn always(run: ScriptedRun) -> Arc<Self> {
        Self::new(vec![run])
    }

    pub fn invocations(&self) -> usize {
        self.executed.lock().len()
    }

    /// Source text of each executed artifact, in order
    pub fn executed_sources(&self) -> Vec<String> {
        self.executed.lock().iter().map(|(_, s)| s.clone()).collect()
    }

    pub fn executed_paths(&self) -> Vec<PathBuf> {
        self.executed.lock().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait::async_trait]
impl SandboxExecutor for ScriptedSandbox {
    async fn execute(&self, artifact: &Path) -> Result<ExecutionOutput, SandboxError> {
        let Ok(source) = std::fs::read_to_string(artifact) else {
            return Err(SandboxError::ArtifactMissing {
                path: artifact.to_path_buf(),
            });
        };
        self.executed.lock().push((artifact.to_path_buf(), source));

        let next = self.runs.lock().pop_front();
        let run = {
            let mut last = self.last.lock();
            if let Some(run) = next {
                *last = Some(run);
            }
            last.clone().unwrap_or_else(|| ScriptedRun::ok(""))
        };

        match run {
            ScriptedRun::Exit {
                stdout,
                stderr,
                status,
            } => Ok(ExecutionOutput::new(stdout, stderr, status)),
            ScriptedRun::Timeout => Err(SandboxError::TimeoutExceeded {
                path: artifact.to_path_buf(),
                timeout: self.timeout,
            }),
            ScriptedRun::SpawnFailure => Err(SandboxError::Spawn {
                interpreter: "scripted".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such interpreter"),
            }),
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Blob store whose every operation fails
#[derive(Debug, Default)]
pub struct FailingBlobStore;

#[async_trait::async_trait]
impl BlobStore for FailingBlobStore {
    async fn put(&self, _key: &str, _bytes: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("blob backend down".into()))
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Unavailable("blob backend down".into()))
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<BlobEntry>, StoreError> {
        Err(StoreError::Unavailable("blob backend down".into()))
    }
}

/// Record store whose every operation fails
#[derive(Debug, Default)]
pub struct FailingRecordStore;

#[async_trait::async_trait]
impl RecordStore for FailingRecordStore {
    async fn put(&self, _record: Record) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("record backend down".into()))
    }

    async fn query(&self, _query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        Err(StoreError::Unavailable("record backend down".into()))
    }
}

/// Config rooted in `dir` with in-memory storage
pub fn test_config(dir: &Path) -> AutofixConfig {
    AutofixConfig::default()
        .with_workspace_root(dir.join("workspaces"))
        .with_storage(StorageConfig::memory())
}

/// A [`CodeAssistant`] over scripted capabilities and a temp workspace
pub struct Harness {
    pub dir: TempDir,
    pub assistant: CodeAssistant,
    pub model: Arc<ScriptedModel>,
    pub sandbox: Arc<ScriptedSandbox>,
    pub project: ProjectName,
    pub filename: Filename,
}

impl Harness {
    pub fn new(model: Arc<ScriptedModel>, sandbox: Arc<ScriptedSandbox>) -> Self {
        Self::build(model, sandbox, |config| config, None, None)
    }

    pub fn build(
        model: Arc<ScriptedModel>,
        sandbox: Arc<ScriptedSandbox>,
        configure: impl FnOnce(AutofixConfig) -> AutofixConfig,
        blobs: Option<Arc<dyn BlobStore>>,
        records: Option<Arc<dyn RecordStore>>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = configure(test_config(dir.path()));

        let assistant = CodeAssistant::builder(config)
            .with_model(Arc::clone(&model) as Arc<dyn GenerativeModel>)
            .with_sandbox(Arc::clone(&sandbox) as Arc<dyn SandboxExecutor>)
            .with_blob_store(
                blobs.unwrap_or_else(|| Arc::new(MemoryBlobStore::new()) as Arc<dyn BlobStore>),
            )
            .with_record_store(records.unwrap_or_else(|| {
                Arc::new(MemoryRecordStore::new()) as Arc<dyn RecordStore>
            }))
            .build()
            .unwrap();

        Self {
            dir,
            assistant,
            model,
            sandbox,
            project: project("demo"),
            filename: filename("main.py"),
        }
    }

    /// Write a live artifact directly, bypassing synthesis
    pub fn seed_artifact(&self, source: &str) -> PathBuf {
        let path = self.assistant.workspace().path(&self.project, &self.filename);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, source).unwrap();
        path
    }
}
