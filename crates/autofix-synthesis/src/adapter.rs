//! Synthesis adapter
//!
//! Turns instructions (and, for repairs, the failing source plus its trace)
//! into bare source text. Stateless: nothing carries over between calls
//! beyond what the repair prompt includes explicitly.

use crate::model::{CompletionRequest, GenerativeModel, ModelError};
use crate::normalize::normalize_source;
use crate::prompts;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single model call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors surfaced by the adapter
///
/// Every variant means "no usable source was produced"; none of them is
/// retried here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// The backend failed
    #[error("synthesis unavailable: {0}")]
    Unavailable(#[from] ModelError),

    /// The call exceeded the adapter's timeout
    #[error("synthesis timed out after {}s", timeout.as_secs_f64())]
    TimedOut { timeout: Duration },

    /// The response contained no source once normalized
    #[error("synthesis returned no source code")]
    EmptyResponse,
}

/// Synthesis/repair front end over a [`GenerativeModel`]
#[derive(Clone)]
pub struct SynthesisAdapter {
    model: Arc<dyn GenerativeModel>,
    call_timeout: Duration,
}

impl std::fmt::Debug for SynthesisAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisAdapter")
            .field("model", &self.model.describe())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl SynthesisAdapter {
    /// Create adapter over `model`
    #[inline]
    #[must_use]
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// With per-call timeout
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Generate source for `instruction`
    ///
    /// # Errors
    /// Returns [`SynthesisError`] if no usable source was produced.
    pub async fn synthesize(&self, instruction: &str) -> Result<String, SynthesisError> {
        tracing::debug!(instruction_len = instruction.len(), "Synthesizing source");
        self.call(prompts::generate_request(instruction)).await
    }

    /// Produce a corrected version of `current_source`
    ///
    /// # Errors
    /// Returns [`SynthesisError`] if no usable source was produced.
    pub async fn repair(
        &self,
        instruction: &str,
        current_source: &str,
        error_trace: &str,
    ) -> Result<String, SynthesisError> {
        tracing::debug!(
            source_len = current_source.len(),
            trace_len = error_trace.len(),
            "Requesting repair"
        );
        self.call(prompts::repair_request(instruction, current_source, error_trace))
            .await
    }

    async fn call(&self, request: CompletionRequest) -> Result<String, SynthesisError> {
        let raw = tokio::time::timeout(self.call_timeout, self.model.complete(&request))
            .await
            .map_err(|_| SynthesisError::TimedOut {
                timeout: self.call_timeout,
            })??;

        let source = normalize_source(&raw);
        if source.is_empty() {
            return Err(SynthesisError::EmptyResponse);
        }
        Ok(source)
    }
}
