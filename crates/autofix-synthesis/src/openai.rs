//! OpenAI-compatible chat completions backend

use crate::model::{CompletionRequest, GenerativeModel, ModelError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Default chat completions endpoint
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default model name
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Environment variable holding the API key by default
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

const MAX_ERROR_BODY_CHARS: usize = 320;

/// Model backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Chat completions URL
    pub endpoint: String,
    /// Model name sent with each request
    pub model: String,
    /// Environment variable consulted when `api_key` is unset
    pub api_key_env: String,
    /// Inline API key (prefer the environment)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl ModelConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Inline key, or the configured environment variable
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
            request_timeout_secs: 60,
            temperature: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// [`GenerativeModel`] speaking the OpenAI chat completions protocol
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
}

impl OpenAiChatModel {
    /// Build from configuration
    ///
    /// # Errors
    /// Returns `ModelError::NotConfigured` if no API key is available or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            ModelError::NotConfigured(format!(
                "no API key (set {} or model.api_key)",
                config.api_key_env
            ))
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .no_proxy()
            .build()
            .map_err(|e| ModelError::NotConfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    fn payload(&self, request: &CompletionRequest) -> Value {
        build_payload(&self.model, self.temperature, request)
    }
}

#[async_trait::async_trait]
impl GenerativeModel for OpenAiChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| ModelError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Unreachable(format!("failed reading response body: {e}")))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited(truncate(&body, MAX_ERROR_BODY_CHARS)));
        }
        if !status.is_success() {
            return Err(ModelError::Rejected {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        parse_completion(&body)
    }

    fn describe(&self) -> String {
        format!("openai-compatible:{}", self.model)
    }
}

fn build_payload(model: &str, temperature: Option<f32>, request: &CompletionRequest) -> Value {
    let mut payload = json!({
        "model": model,
        "messages": [
            { "role": "system", "content": request.system },
            { "role": "user", "content": request.user },
        ],
    });
    if let Some(temp) = temperature {
        payload["temperature"] = json!(temp);
    }
    payload
}

/// Extract the first choice's text from a chat completions body
fn parse_completion(body: &str) -> Result<String, ModelError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ModelError::InvalidResponse(format!("malformed JSON: {e}")))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ModelError::InvalidResponse("response did not include content".into()))?;

    Ok(extract_text(&content))
}

fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn payload_has_system_then_user() {
        let request = CompletionRequest::new("sys", "usr");
        let payload = build_payload("gpt-4", None, &request);

        assert_eq!(payload["model"], "gpt-4");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][0]["content"], "sys");
        assert_eq!(payload["messages"][1]["role"], "user");
        assert_eq!(payload["messages"][1]["content"], "usr");
        assert!(payload.get("temperature").is_none());
    }

    #[test]
    fn payload_includes_temperature_when_set() {
        let payload = build_payload("m", Some(0.5), &CompletionRequest::new("s", "u"));
        assert_eq!(payload["temperature"], 0.5);
    }

    #[test]
    fn parses_string_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"print(1)"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "print(1)");
    }

    #[test]
    fn parses_content_parts() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]
                }
            }]
        })
        .to_string();
        assert_eq!(parse_completion(&body).unwrap(), "ab");
    }

    #[test]
    fn empty_choices_is_invalid() {
        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));

        let err = parse_completion("not json").unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn missing_key_is_not_configured() {
        let config = ModelConfig {
            api_key_env: "AUTOFIX_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..ModelConfig::default()
        };
        let err = OpenAiChatModel::from_config(&config).unwrap_err();
        assert!(matches!(err, ModelError::NotConfigured(_)));
    }

    #[test]
    fn inline_key_wins() {
        let config = ModelConfig {
            api_key: Some("sk-test".into()),
            ..ModelConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let config = ModelConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
            api_key: Some("sk-test".into()),
            request_timeout_secs: 5,
            ..ModelConfig::default()
        };
        let model = OpenAiChatModel::from_config(&config).unwrap();

        let err = model
            .complete(&CompletionRequest::new("s", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Unreachable(_)), "got {err:?}");
    }
}
