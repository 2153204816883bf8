//! Generative model capability
//!
//! Prompt in, text out. The adapter never talks to a concrete backend
//! directly so tests can substitute deterministic models.

use serde::{Deserialize, Serialize};

/// A single-turn completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System prompt framing the task
    pub system: String,
    /// User prompt
    pub user: String,
}

impl CompletionRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Text-generation backend
#[async_trait::async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Produce raw completion text for `request`
    ///
    /// # Errors
    /// Returns [`ModelError`] when the backend is unreachable, rate-limited,
    /// rejects the request, or answers with something unparseable.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;

    /// Short backend description for logs
    fn describe(&self) -> String {
        "generative-model".to_string()
    }
}

/// Errors from a generative backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Backend cannot be used as configured (e.g. missing API key)
    #[error("model backend not configured: {0}")]
    NotConfigured(String),

    /// Connection failed or the transport timed out
    #[error("model backend unreachable: {0}")]
    Unreachable(String),

    /// Backend throttled the request
    #[error("model backend rate-limited the request: {0}")]
    RateLimited(String),

    /// Backend answered with a non-success status
    #[error("model backend rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Backend answered with something that is not a completion
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Transient conditions a caller could retry later
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::RateLimited(_))
    }
}

/// Stand-in for a backend that could not be configured
///
/// Every call fails with [`ModelError::NotConfigured`], so operations that
/// never synthesize keep working without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableModel {
    reason: String,
}

impl UnavailableModel {
    /// Create with the reason reported on every call
    #[inline]
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl GenerativeModel for UnavailableModel {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ModelError> {
        Err(ModelError::NotConfigured(self.reason.clone()))
    }

    fn describe(&self) -> String {
        "unavailable".to_string()
    }
}
