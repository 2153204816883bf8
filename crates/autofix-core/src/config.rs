//! Workspace configuration
//!
//! Resolution order: built-in defaults, then a TOML file, then `AUTOFIX_*`
//! environment overrides.

use autofix_artifact::{Filename, ProjectName};
use autofix_sandbox::SandboxConfig;
use autofix_store::StorageConfig;
use autofix_synthesis::ModelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides `workspace_root`
pub const ENV_WORKSPACE_ROOT: &str = "AUTOFIX_WORKSPACE_ROOT";
/// Overrides `retry_budget`
pub const ENV_RETRY_BUDGET: &str = "AUTOFIX_RETRY_BUDGET";
/// Overrides `storage.root`
pub const ENV_STORAGE_ROOT: &str = "AUTOFIX_STORAGE_ROOT";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofixConfig {
    /// Live artifacts live at `<workspace_root>/<project>/<filename>`
    pub workspace_root: PathBuf,
    /// Executions allowed per auto-fix request
    pub retry_budget: u32,
    /// Executions allowed per generate request
    pub generate_budget: u32,
    /// Snapshot every repaired source, not just generated ones
    pub snapshot_repairs: bool,
    /// Filename used when a command names none
    pub primary_filename: Filename,
    /// Project used when a command names none
    pub default_project: ProjectName,
    pub sandbox: SandboxConfig,
    pub model: ModelConfig,
    pub storage: StorageConfig,
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("./workspaces"),
            retry_budget: 3,
            generate_budget: 1,
            snapshot_repairs: false,
            primary_filename: Filename::default(),
            default_project: ProjectName::default(),
            sandbox: SandboxConfig::default(),
            model: ModelConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl AutofixConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path` (if any), apply environment overrides, validate
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// override is malformed, or the result fails [`Self::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        tracing::debug!(?path, "Configuration loaded");
        Ok(config)
    }

    /// Parse TOML; missing keys keep their defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML or invalid names.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `AUTOFIX_*` overrides read through `lookup`
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] for a non-numeric retry budget.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_WORKSPACE_ROOT) {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(raw) = lookup(ENV_RETRY_BUDGET) {
            self.retry_budget = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_RETRY_BUDGET,
                value: raw.clone(),
            })?;
        }
        if let Some(root) = lookup(ENV_STORAGE_ROOT) {
            self.storage.root = PathBuf::from(root);
        }
        Ok(())
    }

    /// Reject settings the loop cannot run with
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_budget == 0 {
            return Err(ConfigError::Invalid("retry_budget must be at least 1".into()));
        }
        if self.generate_budget == 0 {
            return Err(ConfigError::Invalid("generate_budget must be at least 1".into()));
        }
        if self.sandbox.timeout_secs == 0 {
            return Err(ConfigError::Invalid("sandbox.timeout_secs must be positive".into()));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "model.request_timeout_secs must be positive".into(),
            ));
        }
        if self.sandbox.interpreter.trim().is_empty() {
            return Err(ConfigError::Invalid("sandbox.interpreter is empty".into()));
        }
        Ok(())
    }

    /// With workspace root
    #[inline]
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// With retry budget
    #[inline]
    #[must_use]
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// With generate budget
    #[inline]
    #[must_use]
    pub fn with_generate_budget(mut self, budget: u32) -> Self {
        self.generate_budget = budget;
        self
    }

    /// With repair snapshots on or off
    #[inline]
    #[must_use]
    pub fn with_snapshot_repairs(mut self, enabled: bool) -> Self {
        self.snapshot_repairs = enabled;
        self
    }

    /// With sandbox configuration
    #[inline]
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// With model configuration
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// With storage configuration
    #[inline]
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }
}
