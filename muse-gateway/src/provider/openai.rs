//! OpenAI chat completions provider.

use super::{ChatProvider, ChatRequest, ChatResponse, Message, ProviderError, TokenUsage};
use async_trait::async_trait;
use muse_common::util::sanitize_for_log;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Build an HTTP client that authenticates every request with `api_key`.
pub(crate) fn build_client(api_key: &str, timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| ProviderError::new("openai", "", "API key contains invalid characters", None))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ProviderError::new("openai", "", format!("Failed to build HTTP client: {e}"), None))
}

/// Extract a readable message from an OpenAI error body, falling back to the raw text.
pub(crate) fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }

    #[derive(Deserialize)]
    struct Detail {
        message: String,
        #[serde(default)]
        code: Option<String>,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope {
            error: Detail {
                message,
                code: Some(code),
            },
        }) => format!("{message} ({code})"),
        Ok(envelope) => envelope.error.message,
        Err(_) if body.is_empty() => "empty error body".into(),
        Err(_) => body.to_string(),
    }
}

/// OpenAI API provider.
pub struct OpenAIProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a provider against `https://api.openai.com` with a 120s timeout.
    pub fn new(api_key: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, "https://api.openai.com", Duration::from_secs(120))
    }

    /// Create with custom base URL (for OpenAI-compatible APIs and tests).
    pub fn with_base_url(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(api_key, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();
        let url = format!("{}/v1/chat/completions", self.base_url);
        let model = request.model.clone();

        let openai_request = OpenAIRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| {
                let message = format!("Request failed: {}", sanitize_for_log(&e.to_string()));
                ProviderError::new("openai", &model, message, None)
            })?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                "openai",
                model,
                api_error_message(&body),
                Some(status.as_u16()),
            ));
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            ProviderError::new("openai", &model, format!("Failed to parse response: {e}"), None)
        })?;

        let choice = openai_response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::new("openai", &model, "Response contained no choices", None)
        })?;

        let content = choice.message.content.unwrap_or_default();
        tracing::debug!(
            model = %openai_response.model,
            latency_ms,
            chars = content.chars().count(),
            "Chat completion received"
        );

        Ok(ChatResponse {
            model: openai_response.model,
            content,
            usage: openai_response
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                })
                .unwrap_or_default(),
            finish_reason: choice.finish_reason,
            latency_ms,
        })
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: i64,
    completion_tokens: i64,
    total_tokens: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_request_serialization() {
        let messages = vec![Message::system("Be helpful"), Message::user("Hello")];
        let request = OpenAIRequest {
            model: "gpt-4o",
            messages: &messages,
            max_tokens: Some(1500),
            temperature: Some(0.5),
        };

        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert_eq!(json["max_tokens"], 1500);
    }

    #[test]
    fn test_api_error_message_parses_envelope() {
        let body = r#"{"error":{"message":"Your request was rejected","code":"content_policy_violation"}}"#;
        assert_eq!(
            api_error_message(body),
            "Your request was rejected (content_policy_violation)"
        );
        assert_eq!(
            api_error_message(r#"{"error":{"message":"Bad key"}}"#),
            "Bad key"
        );
        assert_eq!(api_error_message("gateway timeout"), "gateway timeout");
        assert_eq!(api_error_message(""), "empty error body");
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        assert!(OpenAIProvider::new("bad\nkey").is_err());
        assert!(OpenAIProvider::new("sk-test").is_ok());
    }
}
