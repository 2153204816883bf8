//! Prompt construction for synthesis and repair

use crate::model::CompletionRequest;

/// System prompt for first-time generation
pub const GENERATE_SYSTEM_PROMPT: &str = "You are a development assistant that generates working \
    code. Return only the code, without explanations.";

/// System prompt for repairs
pub const REPAIR_SYSTEM_PROMPT: &str =
    "You are a development assistant that fixes errors in code.";

/// Error traces longer than this keep only their tail
pub const MAX_TRACE_CHARS: usize = 8_000;

/// Request for first-time generation
#[must_use]
pub fn generate_request(instruction: &str) -> CompletionRequest {
    CompletionRequest::new(GENERATE_SYSTEM_PROMPT, instruction.trim())
}

/// Request for repairing `current_source` given the trace it produced
#[must_use]
pub fn repair_request(
    instruction: &str,
    current_source: &str,
    error_trace: &str,
) -> CompletionRequest {
    let mut prompt = String::from(
        "The code below fails. Fix the error reported in the traceback.\n\n",
    );
    let instruction = instruction.trim();
    if !instruction.is_empty() {
        prompt.push_str("Original instruction:\n");
        prompt.push_str(instruction);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Current code:\n");
    prompt.push_str(current_source.trim_end());
    prompt.push_str("\n\nError found:\n");
    prompt.push_str(tail_chars(error_trace.trim_end(), MAX_TRACE_CHARS));
    prompt.push_str("\n\nReturn only the corrected code, without explanations.");

    CompletionRequest::new(REPAIR_SYSTEM_PROMPT, prompt)
}

/// Last `max` characters of `s`, on a char boundary
///
/// Python tracebacks put the actual exception last, so the tail is the part
/// worth keeping.
fn tail_chars(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    let skip = count - max;
    s.char_indices().nth(skip).map_or(s, |(idx, _)| &s[idx..])
}
