//! Extraction orchestrator: the retry/backoff state machine driving the
//! LLM gateway and response parser.
//!
//! `extract` never fails. Every gateway or parse failure is absorbed into
//! the retry loop, and on exhaustion (or when the gateway is unconfigured)
//! the rule-based extractor produces a degraded record. The only externally
//! visible signal of degradation is `extraction_method = rule_based`.

use super::parser;
use super::rules;
use super::schema::{
    generation_schema, ExtractedRecord, ExtractionMethod, ExtractionRequest, FinancialRecord,
};
use crate::config::{GatewaySettings, Prompts};
use crate::gateway::{ChatMessage, FinishReason, GenerateOptions, LlmGateway, ResponseFormat};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Cooperative cancellation flag, checked before each attempt and each
/// backoff sleep. Cancelling never loses work: the current record is still
/// produced via the rule-based path.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Tunables for the retry loop.
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    pub max_attempts: u32,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub reasoning_budget: u32,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            temperature: 0.1,
            max_output_tokens: 8000,
            reasoning_budget: 8000,
        }
    }
}

impl From<&GatewaySettings> for ExtractorOptions {
    fn from(settings: &GatewaySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
            reasoning_budget: settings.reasoning_budget,
        }
    }
}

/// Exponential backoff before retry `attempt + 1`: 1s, 2s, 4s...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (attempt.saturating_sub(1)).min(6))
}

/// Drives transcript text through the gateway and parser into a validated
/// financial record.
pub struct FinancialExtractor {
    gateway: Option<Arc<dyn LlmGateway>>,
    prompts: Prompts,
    options: ExtractorOptions,
    cancel: CancelFlag,
}

impl FinancialExtractor {
    /// Create an extractor. `None` for the gateway disables the LLM path
    /// entirely: every extraction goes straight to the rule-based fallback.
    pub fn new(gateway: Option<Arc<dyn LlmGateway>>, prompts: Prompts) -> Self {
        Self {
            gateway,
            prompts,
            options: ExtractorOptions::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_options(mut self, options: ExtractorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whether the LLM extraction path is configured.
    pub fn llm_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Extract structured financial information from a transcript.
    ///
    /// Total: always returns a usable, schema-valid record. Degraded quality
    /// is discoverable only via `extraction_method` / `attempts_used`.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn extract(&self, request: &ExtractionRequest) -> ExtractedRecord {
        let Some(gateway) = self.gateway.clone() else {
            info!("LLM gateway not configured, using rule-based extraction");
            return self.fallback(request, 0);
        };

        let mut last_error = String::new();

        for attempt in 1..=self.options.max_attempts {
            if self.cancel.is_cancelled() {
                warn!(attempt, "extraction cancelled, falling back to rule-based path");
                return self.fallback(request, attempt - 1);
            }

            info!(attempt, max_attempts = self.options.max_attempts, "Extracting with LLM");

            match self.attempt(gateway.as_ref(), request).await {
                Ok((record, tokens_used)) => {
                    info!(attempt, tokens_used, "Extraction succeeded");
                    return ExtractedRecord {
                        record,
                        extraction_method: ExtractionMethod::Llm,
                        tokens_used,
                        attempts_used: attempt,
                        stocks_mentioned: Vec::new(),
                        numbers_found: Vec::new(),
                        note: None,
                    };
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Extraction attempt failed");
                    last_error = err;
                }
            }

            // Non-retryable gateway failures (bad credentials, malformed
            // request) exhaust the same loop; cost is bounded by max_attempts.
            if attempt < self.options.max_attempts {
                let delay = backoff_delay(attempt);
                info!(delay_secs = delay.as_secs(), "Backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }

        warn!(last_error = %last_error, "All extraction attempts failed, using rule-based fallback");
        self.fallback(request, self.options.max_attempts)
    }

    /// One full cycle: prompt build → gateway call → parse.
    async fn attempt(
        &self,
        gateway: &dyn LlmGateway,
        request: &ExtractionRequest,
    ) -> Result<(FinancialRecord, u64), String> {
        let prompt = self
            .prompts
            .extraction_prompt(&request.title, &request.transcript);
        let conversation = [ChatMessage::user(prompt)];

        let options = GenerateOptions {
            temperature: self.options.temperature,
            max_output_tokens: self.options.max_output_tokens,
            reasoning_budget: self.options.reasoning_budget,
            response_format: ResponseFormat::Json,
            response_schema: Some(generation_schema()),
        };

        let generation = gateway
            .generate(&conversation, &options)
            .await
            .map_err(|e| format!("gateway: {e}"))?;

        if generation.finish_reason != FinishReason::Stop {
            warn!(finish_reason = %generation.finish_reason, "Generation did not finish normally");
        }

        // Non-empty text is parsed regardless of finish reason; a truncated
        // record fails schema validation on its own.
        if generation.text.trim().is_empty() {
            return Err(format!(
                "empty response (finish_reason={})",
                generation.finish_reason
            ));
        }

        let record = parser::parse(&generation.text).map_err(|e| format!("parse: {e}"))?;
        Ok((record, generation.tokens_used))
    }

    fn fallback(&self, request: &ExtractionRequest, attempts_used: u32) -> ExtractedRecord {
        let basic = rules::extract_basic(&request.transcript, &request.title);
        ExtractedRecord {
            record: basic.record,
            extraction_method: ExtractionMethod::RuleBased,
            tokens_used: 0,
            attempts_used,
            stocks_mentioned: basic.stocks_mentioned,
            numbers_found: basic.numbers_found,
            note: Some(basic.note),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, Generation};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Gateway returning a scripted sequence of results.
    struct ScriptedGateway {
        script: Mutex<VecDeque<Result<Generation, GatewayError>>>,
        calls: std::sync::atomic::AtomicU32,
    }

    impl ScriptedGateway {
        fn new(script: Vec<Result<Generation, GatewayError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: std::sync::atomic::AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl LlmGateway for ScriptedGateway {
        async fn generate(
            &self,
            _conversation: &[ChatMessage],
            _options: &GenerateOptions,
        ) -> Result<Generation, GatewayError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Backend("script exhausted".into())))
        }
    }

    fn ok_generation(text: &str, tokens: u64) -> Result<Generation, GatewayError> {
        Ok(Generation {
            text: text.to_string(),
            tokens_used: tokens,
            finish_reason: FinishReason::Stop,
        })
    }

    fn valid_record_json(symbol: &str) -> String {
        serde_json::json!({
            "summary": "Tech names led the session.",
            "market_overview": {
                "date": "2025-09-10",
                "major_indices": [],
                "market_sentiment": "risk-on"
            },
            "macroeconomic_data": [],
            "stock_analysis": [
                {
                    "symbol": symbol,
                    "key_points": ["rose 3% to $120", "support at $110"],
                    "price_levels": {"support": ["$110"], "resistance": [], "target": []}
                }
            ],
            "key_events": [],
            "investment_advice": [],
            "risks_and_warnings": []
        })
        .to_string()
    }

    fn request() -> ExtractionRequest {
        ExtractionRequest::new("NVDA rose 3% to $120, support at $110.", "Tech Update").unwrap()
    }

    fn extractor_with(gateway: ScriptedGateway) -> FinancialExtractor {
        FinancialExtractor::new(Some(Arc::new(gateway)), Prompts::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_first_attempt_success() {
        let gateway = ScriptedGateway::new(vec![ok_generation(&valid_record_json("NVDA"), 500)]);
        let extractor = extractor_with(gateway);

        let record = extractor.extract(&request()).await;

        assert_eq!(record.extraction_method, ExtractionMethod::Llm);
        assert_eq!(record.tokens_used, 500);
        assert_eq!(record.attempts_used, 1);
        assert_eq!(record.record.stock_analysis[0].symbol, "NVDA");
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_success_when_gateway_always_fails() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::Timeout),
            Err(GatewayError::RateLimited("quota".into())),
            Err(GatewayError::Network("reset".into())),
        ]);
        let extractor = extractor_with(gateway);

        let record = extractor.extract(&request()).await;

        assert_eq!(record.extraction_method, ExtractionMethod::RuleBased);
        assert_eq!(record.attempts_used, 3);
        assert!(!record.record.summary.is_empty());
        assert!(record.record.stock_analysis.is_empty());
        assert!(record.stocks_mentioned.contains(&"NVDA".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schema_invalid_retried_then_succeeds() {
        // Parseable JSON that violates the schema: recommendation is not in
        // the enum. Two bad attempts, then a valid one.
        let bad = serde_json::json!({
            "summary": "s",
            "market_overview": {"date": "", "market_sentiment": ""},
            "stock_analysis": [{"symbol": "NVDA", "key_points": [], "recommendation": "strong buy"}]
        })
        .to_string();

        let gateway = ScriptedGateway::new(vec![
            ok_generation(&bad, 100),
            ok_generation(&bad, 100),
            ok_generation(&valid_record_json("NVDA"), 300),
        ]);
        let extractor = extractor_with(gateway);

        let record = extractor.extract(&request()).await;

        assert_eq!(record.extraction_method, ExtractionMethod::Llm);
        assert_eq!(record.attempts_used, 3);
        assert_eq!(record.tokens_used, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::Timeout),
            Err(GatewayError::Timeout),
            ok_generation(&valid_record_json("NVDA"), 200),
        ]);
        let extractor = extractor_with(gateway);

        let start = tokio::time::Instant::now();
        let record = extractor.extract(&request()).await;
        let elapsed = start.elapsed();

        // 1s after attempt 1, 2s after attempt 2.
        assert!(elapsed >= Duration::from_secs(3), "elapsed: {elapsed:?}");
        assert_eq!(record.attempts_used, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_gateway_returns_immediately() {
        let extractor = FinancialExtractor::new(None, Prompts::default());

        let start = tokio::time::Instant::now();
        let record = extractor.extract(&request()).await;

        assert!(start.elapsed() < Duration::from_millis(1));
        assert_eq!(record.extraction_method, ExtractionMethod::RuleBased);
        assert_eq!(record.attempts_used, 0);
        assert!(record.note.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_response_counts_as_failure() {
        let empty = Generation {
            text: String::new(),
            tokens_used: 0,
            finish_reason: FinishReason::Empty,
        };
        let gateway = ScriptedGateway::new(vec![
            Ok(empty.clone()),
            Ok(empty.clone()),
            Ok(empty),
        ]);
        let extractor = extractor_with(gateway);

        let record = extractor.extract(&request()).await;

        assert_eq!(record.extraction_method, ExtractionMethod::RuleBased);
        assert_eq!(record.attempts_used, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncated_text_still_parsed() {
        // Length-limited finish with complete JSON text: parsed normally.
        let generation = Generation {
            text: valid_record_json("AAPL"),
            tokens_used: 800,
            finish_reason: FinishReason::Length,
        };
        let gateway = ScriptedGateway::new(vec![Ok(generation)]);
        let extractor = extractor_with(gateway);

        let record = extractor.extract(&request()).await;

        assert_eq!(record.extraction_method, ExtractionMethod::Llm);
        assert_eq!(record.record.stock_analysis[0].symbol, "AAPL");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_extraction_falls_back() {
        let gateway = ScriptedGateway::new(vec![ok_generation(&valid_record_json("NVDA"), 500)]);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let extractor = extractor_with(gateway).with_cancel_flag(cancel);

        let record = extractor.extract(&request()).await;

        assert_eq!(record.extraction_method, ExtractionMethod::RuleBased);
        assert_eq!(record.attempts_used, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_called_once_per_attempt() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Err(GatewayError::Timeout),
            ok_generation(&valid_record_json("NVDA"), 100),
        ]));
        let extractor = FinancialExtractor::new(Some(gateway.clone()), Prompts::default());

        let record = extractor.extract(&request()).await;

        assert_eq!(gateway.calls(), 2);
        assert_eq!(record.attempts_used, 2);
    }

    #[test]
    fn test_backoff_delay_doubles() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
    }
}
