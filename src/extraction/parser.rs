//! Response parser: raw model output → schema-shaped financial record.
//!
//! Models wrap JSON in code fences or surround it with prose, so decoding
//! tries an ordered list of cleanup strategies; the first candidate that
//! parses wins. Failure is a typed result, never a panic: the orchestrator
//! decides whether to retry.

use super::schema::FinancialRecord;
use thiserror::Error;

/// Maximum characters of raw output preserved in a parse error.
const SNIPPET_CHARS: usize = 500;

/// Why parsing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    /// No strategy produced valid JSON.
    Malformed,
    /// Valid JSON that does not satisfy the record schema (missing required
    /// field, out-of-enum value).
    SchemaViolation,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseFailure::Malformed => write!(f, "malformed"),
            ParseFailure::SchemaViolation => write!(f, "schema_violation"),
        }
    }
}

/// Typed parse failure carrying the head of the offending output.
#[derive(Error, Debug)]
#[error("{reason} model output: {detail}")]
pub struct ParseError {
    pub reason: ParseFailure,
    pub detail: String,
    /// First [`SNIPPET_CHARS`] characters of the raw output, for logs.
    pub raw_snippet: String,
}

impl ParseError {
    fn new(reason: ParseFailure, detail: impl Into<String>, raw: &str) -> Self {
        Self {
            reason,
            detail: detail.into(),
            raw_snippet: snippet(raw),
        }
    }
}

/// Char-boundary-safe head of the raw output. Transcripts are frequently
/// CJK, so byte slicing would panic.
fn snippet(raw: &str) -> String {
    raw.chars().take(SNIPPET_CHARS).collect()
}

/// Candidate cleanup strategies, tried in order.
fn verbatim(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Remove Markdown fences (```json ... ``` or ``` ... ```).
fn strip_code_fence(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return None;
    }
    let mut inner = trimmed;
    if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
        inner = after_first;
    }
    if let Some(end) = inner.rfind("```") {
        inner = &inner[..end];
    }
    let inner = inner.trim();
    (!inner.is_empty()).then(|| inner.to_string())
}

/// Best-effort extraction: first '{' to last '}'.
fn brace_slice(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(raw[start..=end].trim().to_string())
}

const STRATEGIES: &[fn(&str) -> Option<String>] = &[verbatim, strip_code_fence, brace_slice];

/// Decode raw model output into a JSON value, trying each strategy in order.
pub fn decode_json(raw: &str) -> Result<serde_json::Value, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::new(
            ParseFailure::Malformed,
            "empty response",
            raw,
        ));
    }

    let mut last_error = None;
    for strategy in STRATEGIES {
        let Some(candidate) = strategy(raw) else {
            continue;
        };
        match serde_json::from_str::<serde_json::Value>(&candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }

    let detail = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no JSON candidate found".to_string());
    Err(ParseError::new(ParseFailure::Malformed, detail, raw))
}

/// Parse raw model output into a validated [`FinancialRecord`].
pub fn parse(raw: &str) -> Result<FinancialRecord, ParseError> {
    let value = decode_json(raw)?;

    serde_json::from_value(value)
        .map_err(|e| ParseError::new(ParseFailure::SchemaViolation, e.to_string(), raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_record_json() -> String {
        serde_json::json!({
            "summary": "Markets drifted sideways.",
            "market_overview": {
                "date": "2025-09-10",
                "major_indices": [],
                "market_sentiment": "neutral"
            },
            "macroeconomic_data": [],
            "stock_analysis": [],
            "key_events": [],
            "investment_advice": [],
            "risks_and_warnings": []
        })
        .to_string()
    }

    #[test]
    fn test_decode_identical_across_noise_forms() {
        let plain = r#"{"a":1}"#;
        let fenced = "```json\n{\"a\":1}\n```";
        let noisy = "noise{\"a\":1}noise";

        let expected = serde_json::json!({"a": 1});
        assert_eq!(decode_json(plain).unwrap(), expected);
        assert_eq!(decode_json(fenced).unwrap(), expected);
        assert_eq!(decode_json(noisy).unwrap(), expected);
    }

    #[test]
    fn test_parse_valid_record() {
        let record = parse(&minimal_record_json()).unwrap();
        assert_eq!(record.summary, "Markets drifted sideways.");
        assert_eq!(record.market_overview.date, "2025-09-10");
    }

    #[test]
    fn test_parse_fenced_record() {
        let fenced = format!("```json\n{}\n```", minimal_record_json());
        assert!(parse(&fenced).is_ok());
    }

    #[test]
    fn test_empty_input_is_malformed() {
        let err = parse("   ").unwrap_err();
        assert_eq!(err.reason, ParseFailure::Malformed);
    }

    #[test]
    fn test_prose_without_json_is_malformed() {
        let err = parse("I could not extract anything useful.").unwrap_err();
        assert_eq!(err.reason, ParseFailure::Malformed);
    }

    #[test]
    fn test_missing_required_field_is_schema_violation() {
        // No summary.
        let raw = r#"{"market_overview": {"date": "", "market_sentiment": ""}}"#;
        let err = parse(raw).unwrap_err();
        assert_eq!(err.reason, ParseFailure::SchemaViolation);
    }

    #[test]
    fn test_out_of_enum_recommendation_rejected() {
        let raw = serde_json::json!({
            "summary": "s",
            "market_overview": {"date": "", "market_sentiment": ""},
            "stock_analysis": [
                {"symbol": "TSLA", "key_points": [], "recommendation": "strong buy"}
            ]
        })
        .to_string();

        let err = parse(&raw).unwrap_err();
        assert_eq!(err.reason, ParseFailure::SchemaViolation);
        assert!(err.detail.contains("recommendation"));
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        // Over 500 CJK characters; byte-indexed truncation would panic.
        let raw = "市".repeat(600);
        let err = parse(&raw).unwrap_err();
        assert_eq!(err.raw_snippet.chars().count(), 500);
    }
}
