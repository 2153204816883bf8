//! Autofix Synthesis
//!
//! Sends natural-language instructions (and, for repairs, the failing
//! source plus its error trace) to a generative model and returns bare
//! source text.
//!
//! - [`GenerativeModel`]: backend capability (prompt in, text out)
//! - [`OpenAiChatModel`]: OpenAI-compatible HTTP backend
//! - [`SynthesisAdapter`]: `synthesize` / `repair` with per-call timeout and
//!   [`normalize_source`] applied to every response
//!
//! Backend failures are reported, never retried or swallowed: callers must
//! be able to tell "generation did not happen" from "the generated program
//! is wrong".

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod adapter;
pub mod model;
pub mod normalize;
pub mod openai;
pub mod prompts;

pub use adapter::{SynthesisAdapter, SynthesisError, DEFAULT_CALL_TIMEOUT};
pub use model::{CompletionRequest, GenerativeModel, ModelError, UnavailableModel};
pub use normalize::normalize_source;
pub use openai::{ModelConfig, OpenAiChatModel, DEFAULT_MODEL, DEFAULT_OPENAI_ENDPOINT};
