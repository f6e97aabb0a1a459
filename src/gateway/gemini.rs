//! Google Gemini gateway over the Generative Language REST API.

use super::{
    ChatMessage, FinishReason, GenerateOptions, Generation, GatewayError, LlmGateway,
    ResponseFormat, Role,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration injected at gateway construction. No ambient/global state.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Whole-call timeout; on expiry the call surfaces `GatewayError::Timeout`
    /// instead of hanging.
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Build a config from an API key plus environment overrides.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Gemini-backed [`LlmGateway`].
#[derive(Debug, Clone)]
pub struct GeminiGateway {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Split a conversation into Gemini contents plus an optional system
    /// instruction. Assistant messages map to the "model" role.
    fn convert_conversation(conversation: &[ChatMessage]) -> (Vec<Content>, Option<Content>) {
        let mut contents = Vec::new();
        let mut system_instruction = None;

        for message in conversation {
            match message.role {
                Role::System => {
                    system_instruction = Some(Content {
                        role: None,
                        parts: vec![Part { text: message.content.clone() }],
                    });
                }
                Role::User => contents.push(Content {
                    role: Some("user"),
                    parts: vec![Part { text: message.content.clone() }],
                }),
                Role::Assistant => contents.push(Content {
                    role: Some("model"),
                    parts: vec![Part { text: message.content.clone() }],
                }),
            }
        }

        (contents, system_instruction)
    }

    fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("STOP") => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::Length,
            // SAFETY, RECITATION, and anything the API adds later.
            Some(_) => FinishReason::Error,
            None => FinishReason::Error,
        }
    }

    /// Concatenate the candidate's text parts, skipping thought parts.
    fn response_text(response: &GenerateContentResponse) -> String {
        let mut out = String::new();
        if let Some(candidate) = response.candidates.first() {
            if let Some(content) = &candidate.content {
                for part in &content.parts {
                    if part.thought {
                        continue;
                    }
                    if let Some(text) = &part.text {
                        out.push_str(text);
                    }
                }
            }
        }
        out
    }

    fn total_tokens(response: &GenerateContentResponse) -> u64 {
        response
            .usage_metadata
            .as_ref()
            .map(|u| u.prompt_token_count + u.candidates_token_count + u.thoughts_token_count)
            .unwrap_or(0)
    }

    /// Pull a readable message out of an API error body.
    fn error_message(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| {
                let mut snippet: String = body.chars().take(200).collect();
                if snippet.is_empty() {
                    snippet = "(empty body)".to_string();
                }
                snippet
            })
    }
}

#[async_trait]
impl LlmGateway for GeminiGateway {
    async fn generate(
        &self,
        conversation: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<Generation, GatewayError> {
        if conversation.is_empty() {
            return Err(GatewayError::InvalidRequest("empty conversation".to_string()));
        }

        let (contents, system_instruction) = Self::convert_conversation(conversation);

        let request = GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
                response_mime_type: match options.response_format {
                    ResponseFormat::Json => Some("application/json"),
                    ResponseFormat::Text => None,
                },
                response_schema: options.response_schema.clone(),
                thinking_config: ThinkingConfig { thinking_budget: options.reasoning_budget },
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        debug!(model = %self.config.model, messages = conversation.len(), "Calling Gemini API");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let message = Self::error_message(&body);
            return Err(match status.as_u16() {
                401 | 403 => GatewayError::PermissionDenied(message),
                400 => GatewayError::InvalidRequest(message),
                429 => GatewayError::RateLimited(message),
                code => GatewayError::Backend(format!("status {code}: {message}")),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Backend(format!("unparseable response: {e}")))?;

        let text = Self::response_text(&parsed);
        let tokens_used = Self::total_tokens(&parsed);

        let finish_reason = if text.trim().is_empty() {
            FinishReason::Empty
        } else {
            Self::parse_finish_reason(
                parsed
                    .candidates
                    .first()
                    .and_then(|c| c.finish_reason.as_deref()),
            )
        };

        debug!(%finish_reason, tokens_used, "Gemini call complete");

        Ok(Generation { text, tokens_used, finish_reason })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_conversation_roles() {
        let conversation = vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
        ];

        let (contents, system) = GeminiGateway::convert_conversation(&conversation);

        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, Some("user"));
        assert_eq!(contents[1].role, Some("model"));
        assert_eq!(system.unwrap().parts[0].text, "be terse");
    }

    #[test]
    fn test_parse_finish_reason() {
        assert_eq!(
            GeminiGateway::parse_finish_reason(Some("STOP")),
            FinishReason::Stop
        );
        assert_eq!(
            GeminiGateway::parse_finish_reason(Some("MAX_TOKENS")),
            FinishReason::Length
        );
        assert_eq!(
            GeminiGateway::parse_finish_reason(Some("SAFETY")),
            FinishReason::Error
        );
        assert_eq!(GeminiGateway::parse_finish_reason(None), FinishReason::Error);
    }

    #[test]
    fn test_response_text_skips_thought_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "planning...", "thought": true},
                        {"text": "{\"a\":"},
                        {"text": "1}"},
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 100,
                "candidatesTokenCount": 50,
                "thoughtsTokenCount": 25
            }
        }))
        .unwrap();

        assert_eq!(GeminiGateway::response_text(&response), "{\"a\":1}");
        assert_eq!(GeminiGateway::total_tokens(&response), 175);
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(GeminiGateway::error_message(body), "Quota exceeded");

        assert_eq!(GeminiGateway::error_message("plain text"), "plain text");
    }
}
