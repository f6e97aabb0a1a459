//! LLM gateway abstraction.
//!
//! A narrow interface around one remote text-generation call. The gateway
//! performs no retries; retry policy belongs to the extraction orchestrator.

mod gemini;

pub use gemini::{GeminiConfig, GeminiGateway};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in the conversation passed to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// Generation parameters recognized by the gateway.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Sampling temperature, [0, 2].
    pub temperature: f32,
    /// Output token ceiling.
    pub max_output_tokens: u32,
    /// Reasoning/thinking token budget, [1, 24576].
    pub reasoning_budget: u32,
    pub response_format: ResponseFormat,
    /// Optional structural schema hint forwarded to the backend.
    pub response_schema: Option<serde_json::Value>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_output_tokens: 8000,
            reasoning_budget: 8000,
            response_format: ResponseFormat::Text,
            response_schema: None,
        }
    }
}

/// Terminal status of one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Normal completion. With non-empty text this is the only
    /// unconditionally successful outcome.
    Stop,
    /// Output token ceiling hit; text may be truncated.
    Length,
    Timeout,
    RateLimited,
    InvalidRequest,
    PermissionDenied,
    /// The backend answered but produced no text.
    Empty,
    Error,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::Timeout => "timeout",
            FinishReason::RateLimited => "rate_limited",
            FinishReason::InvalidRequest => "invalid_request",
            FinishReason::PermissionDenied => "permission_denied",
            FinishReason::Empty => "empty",
            FinishReason::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Successful (possibly degenerate) result of one generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub tokens_used: u64,
    pub finish_reason: FinishReason,
}

/// Typed failure categories for a gateway call.
///
/// The orchestrator's backoff policy branches on these, so they must stay
/// distinguishable rather than collapsing into a generic error string.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl GatewayError {
    /// The finish reason this failure corresponds to, for logs and records.
    pub fn finish_reason(&self) -> FinishReason {
        match self {
            GatewayError::Timeout => FinishReason::Timeout,
            GatewayError::RateLimited(_) => FinishReason::RateLimited,
            GatewayError::PermissionDenied(_) => FinishReason::PermissionDenied,
            GatewayError::InvalidRequest(_) => FinishReason::InvalidRequest,
            GatewayError::Network(_) | GatewayError::Backend(_) => FinishReason::Error,
        }
    }
}

/// Trait for remote text-generation backends.
///
/// One network call per `generate` invocation, no retries at this layer.
/// Credentials are injected at construction; the gateway assumes they are
/// valid and reports `PermissionDenied` if the backend rejects them.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn generate(
        &self,
        conversation: &[ChatMessage],
        options: &GenerateOptions,
    ) -> std::result::Result<Generation, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_maps_to_finish_reason() {
        assert_eq!(GatewayError::Timeout.finish_reason(), FinishReason::Timeout);
        assert_eq!(
            GatewayError::RateLimited("quota".into()).finish_reason(),
            FinishReason::RateLimited
        );
        assert_eq!(
            GatewayError::PermissionDenied("bad key".into()).finish_reason(),
            FinishReason::PermissionDenied
        );
        assert_eq!(
            GatewayError::Network("reset".into()).finish_reason(),
            FinishReason::Error
        );
    }

    #[test]
    fn test_finish_reason_display() {
        assert_eq!(FinishReason::Stop.to_string(), "stop");
        assert_eq!(FinishReason::RateLimited.to_string(), "rate_limited");
    }
}
