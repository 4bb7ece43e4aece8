//! Chat completion providers.
//!
//! Provides a unified interface for calling a chat model, plus the error
//! type shared with the image providers.

mod openai;

pub use openai::OpenAIProvider;
pub(crate) use openai::{api_error_message, build_client};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Trait
// ============================================================================

/// Unified interface for chat completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Send a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Error from a provider.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub message: String,
    /// HTTP status, `None` for transport or decoding failures
    pub status_code: Option<u16>,
}

impl ProviderError {
    pub(crate) fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Whether the upstream rejected the request itself (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code, Some(400..=499))
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures, 5xx, 408 and 429 are retryable; other 4xx are not.
    pub fn is_retryable(&self) -> bool {
        match self.status_code {
            None => true,
            Some(408) | Some(429) => true,
            Some(_) => !self.is_client_error(),
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(status) => write!(
                f,
                "[{}:{}] HTTP {}: {}",
                self.provider, self.model, status, self.message
            ),
            None => write!(f, "[{}:{}] {}", self.provider, self.model, self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Unified chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Messages in order, system prompt first
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Unified chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Model used
    pub model: String,
    /// Response content
    pub content: String,
    /// Token usage
    pub usage: TokenUsage,
    /// Finish reason
    pub finish_reason: Option<String>,
    /// Response latency in milliseconds
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_with(status: Option<u16>) -> ProviderError {
        ProviderError::new("openai", "gpt-4o", "boom", status)
    }

    #[test]
    fn test_retryable_classification() {
        assert!(error_with(None).is_retryable());
        assert!(error_with(Some(500)).is_retryable());
        assert!(error_with(Some(503)).is_retryable());
        assert!(error_with(Some(429)).is_retryable());
        assert!(error_with(Some(408)).is_retryable());
        assert!(!error_with(Some(400)).is_retryable());
        assert!(!error_with(Some(401)).is_retryable());
        assert!(error_with(Some(400)).is_client_error());
        assert!(!error_with(Some(502)).is_client_error());
    }

    #[test]
    fn test_display_includes_status() {
        assert_eq!(error_with(Some(401)).to_string(), "[openai:gpt-4o] HTTP 401: boom");
        assert_eq!(error_with(None).to_string(), "[openai:gpt-4o] boom");
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
