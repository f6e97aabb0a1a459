//! Canonical shape of an extracted financial record.
//!
//! The LLM generation schema asks for the analyst's native-language labels
//! (买入/持有/...); those are translated into the language-neutral enums here
//! at the parser boundary. An out-of-enum value is a deserialization error,
//! never a silent coercion.

use crate::error::{FinsightError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Immutable input to one extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Transcribed commentary text. Never empty.
    pub transcript: String,
    /// Title of the source video.
    pub title: String,
    /// Detected or caller-supplied language (e.g. "zh", "en").
    pub language_hint: Option<String>,
}

impl ExtractionRequest {
    /// Create a request, rejecting an empty transcript.
    pub fn new(transcript: impl Into<String>, title: impl Into<String>) -> Result<Self> {
        let transcript = transcript.into();
        if transcript.trim().is_empty() {
            return Err(FinsightError::InvalidInput(
                "transcript must not be empty".to_string(),
            ));
        }
        Ok(Self {
            transcript,
            title: title.into(),
            language_hint: None,
        })
    }

    /// Attach a language hint.
    pub fn with_language_hint(mut self, hint: impl Into<String>) -> Self {
        self.language_hint = Some(hint.into());
        self
    }
}

/// How a record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Llm,
    RuleBased,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMethod::Llm => write!(f, "llm"),
            ExtractionMethod::RuleBased => write!(f, "rule_based"),
        }
    }
}

/// Analyst recommendation for a single stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Recommendation {
    Buy,
    Hold,
    Sell,
    Watch,
}

impl FromStr for Recommendation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "买入" => Ok(Recommendation::Buy),
            "hold" | "持有" => Ok(Recommendation::Hold),
            "sell" | "卖出" => Ok(Recommendation::Sell),
            "watch" | "观望" => Ok(Recommendation::Watch),
            other => Err(format!("unknown recommendation: {other}")),
        }
    }
}

impl TryFrom<String> for Recommendation {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Time horizon of a piece of investment advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Timeframe {
    Short,
    Medium,
    Long,
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" | "短期" => Ok(Timeframe::Short),
            "medium" | "中期" => Ok(Timeframe::Medium),
            "long" | "长期" => Ok(Timeframe::Long),
            other => Err(format!("unknown timeframe: {other}")),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Category of a market-moving event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum EventCategory {
    Earnings,
    Policy,
    MacroData,
    CorporateAction,
    Other,
}

impl FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "earnings" | "财报" => Ok(EventCategory::Earnings),
            "policy" | "政策" => Ok(EventCategory::Policy),
            "macro_data" | "经济数据" => Ok(EventCategory::MacroData),
            "corporate_action" | "企业行为" => Ok(EventCategory::CorporateAction),
            "other" | "其他" => Ok(EventCategory::Other),
            other => Err(format!("unknown event category: {other}")),
        }
    }
}

impl TryFrom<String> for EventCategory {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Severity or probability grade for a risk. Shared by both fields since the
/// domain is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "低" => Ok(RiskLevel::Low),
            "medium" | "中" => Ok(RiskLevel::Medium),
            "high" | "高" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

impl TryFrom<String> for RiskLevel {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// One market index mentioned in the commentary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Index name (e.g. "S&P 500", "纳斯达克").
    pub name: String,
    /// Performance description for the session.
    pub performance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_level: Option<String>,
    /// Key technical levels. Always a list, possibly empty.
    #[serde(default)]
    pub key_levels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

/// Market overview section of a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketOverview {
    /// Analysis date, ISO format (YYYY-MM-DD) when known.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub major_indices: Vec<IndexEntry>,
    #[serde(default)]
    pub market_sentiment: String,
}

/// One macroeconomic data point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroEntry {
    pub indicator: String,
    /// Market impact analysis.
    pub impact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
}

/// Support/resistance/target price levels for a stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceLevels {
    #[serde(default)]
    pub support: Vec<String>,
    #[serde(default)]
    pub resistance: Vec<String>,
    #[serde(default)]
    pub target: Vec<String>,
}

/// Analysis of a single stock or ETF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEntry {
    /// Exchange ticker symbol.
    pub symbol: String,
    /// Key analysis points. Always a list, possibly empty.
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_levels: Option<PriceLevels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_reward_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_notes: Option<String>,
}

/// A market-moving event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    pub event: String,
    pub impact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<EventCategory>,
}

/// A piece of investment advice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceEntry {
    pub advice: String,
    pub timeframe: Timeframe,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
}

/// A risk flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEntry {
    pub risk: String,
    pub severity: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}

/// The canonical structured output of one extraction.
///
/// `summary` and `market_overview` are required; every list field defaults to
/// an empty list when absent so downstream consumers never see null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub summary: String,
    pub market_overview: MarketOverview,
    #[serde(default)]
    pub macroeconomic_data: Vec<MacroEntry>,
    #[serde(default)]
    pub stock_analysis: Vec<StockEntry>,
    #[serde(default)]
    pub key_events: Vec<EventEntry>,
    #[serde(default)]
    pub investment_advice: Vec<AdviceEntry>,
    #[serde(default)]
    pub risks_and_warnings: Vec<RiskEntry>,
}

/// A financial record plus the metadata the extraction orchestrator attaches.
///
/// Constructed fresh per extraction call and never mutated after it is
/// returned; callers may persist it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(flatten)]
    pub record: FinancialRecord,
    /// Set exactly once, by the orchestrator.
    pub extraction_method: ExtractionMethod,
    pub tokens_used: u64,
    /// Gateway attempts made; 0 when the LLM path was skipped entirely.
    pub attempts_used: u32,
    /// Ticker-like tokens found by the rule-based path (informational).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stocks_mentioned: Vec<String>,
    /// Price/percentage strings found by the rule-based path (informational).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numbers_found: Vec<String>,
    /// Human-readable flag for degraded extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Structural schema hint forwarded to the generation backend.
///
/// Mirrors [`FinancialRecord`] but keeps the analyst-native enum labels the
/// prompt requests; translation to the neutral enums happens in the parser.
pub fn generation_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": [
            "summary",
            "market_overview",
            "macroeconomic_data",
            "stock_analysis",
            "key_events",
            "investment_advice",
            "risks_and_warnings"
        ],
        "properties": {
            "summary": {"type": "string"},
            "market_overview": {
                "type": "object",
                "required": ["date", "major_indices", "market_sentiment"],
                "properties": {
                    "date": {"type": "string"},
                    "major_indices": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["name", "performance"],
                            "properties": {
                                "name": {"type": "string"},
                                "performance": {"type": "string"},
                                "current_level": {"type": "string"},
                                "key_levels": {"type": "array", "items": {"type": "string"}},
                                "analysis": {"type": "string"}
                            }
                        }
                    },
                    "market_sentiment": {"type": "string"}
                }
            },
            "macroeconomic_data": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["indicator", "impact"],
                    "properties": {
                        "indicator": {"type": "string"},
                        "actual_value": {"type": "string"},
                        "expected_value": {"type": "string"},
                        "previous_value": {"type": "string"},
                        "impact": {"type": "string"},
                        "interpretation": {"type": "string"}
                    }
                }
            },
            "stock_analysis": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["symbol", "key_points"],
                    "properties": {
                        "symbol": {"type": "string"},
                        "company_name": {"type": "string"},
                        "current_price": {"type": "string"},
                        "price_change": {"type": "string"},
                        "key_points": {"type": "array", "items": {"type": "string"}},
                        "price_levels": {
                            "type": "object",
                            "properties": {
                                "support": {"type": "array", "items": {"type": "string"}},
                                "resistance": {"type": "array", "items": {"type": "string"}},
                                "target": {"type": "array", "items": {"type": "string"}}
                            }
                        },
                        "recommendation": {"type": "string", "enum": ["买入", "持有", "卖出", "观望"]},
                        "risk_reward_ratio": {"type": "string"},
                        "analyst_notes": {"type": "string"}
                    }
                }
            },
            "key_events": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["event", "impact"],
                    "properties": {
                        "event": {"type": "string"},
                        "date": {"type": "string"},
                        "impact": {"type": "string"},
                        "category": {"type": "string", "enum": ["财报", "政策", "经济数据", "企业行为", "其他"]}
                    }
                }
            },
            "investment_advice": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["advice", "timeframe"],
                    "properties": {
                        "advice": {"type": "string"},
                        "timeframe": {"type": "string", "enum": ["短期", "中期", "长期"]},
                        "rationale": {"type": "string"},
                        "target_audience": {"type": "string"}
                    }
                }
            },
            "risks_and_warnings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["risk", "severity"],
                    "properties": {
                        "risk": {"type": "string"},
                        "severity": {"type": "string", "enum": ["低", "中", "高"]},
                        "probability": {"type": "string", "enum": ["低", "中", "高"]},
                        "mitigation": {"type": "string"}
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_schema_lists_all_sections() {
        let schema = generation_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 7);
        assert!(schema["properties"]["stock_analysis"].is_object());
    }

    #[test]
    fn test_request_rejects_empty_transcript() {
        assert!(ExtractionRequest::new("", "title").is_err());
        assert!(ExtractionRequest::new("   \n ", "title").is_err());
        assert!(ExtractionRequest::new("NVDA rose 3%", "title").is_ok());
    }

    #[test]
    fn test_recommendation_accepts_both_label_sets() {
        assert_eq!("buy".parse::<Recommendation>().unwrap(), Recommendation::Buy);
        assert_eq!("买入".parse::<Recommendation>().unwrap(), Recommendation::Buy);
        assert_eq!("观望".parse::<Recommendation>().unwrap(), Recommendation::Watch);
        assert!("strong buy".parse::<Recommendation>().is_err());
    }

    #[test]
    fn test_enum_serializes_neutral_labels() {
        let json = serde_json::to_string(&Recommendation::Buy).unwrap();
        assert_eq!(json, "\"buy\"");
        let json = serde_json::to_string(&EventCategory::MacroData).unwrap();
        assert_eq!(json, "\"macro_data\"");
        let json = serde_json::to_string(&Timeframe::Short).unwrap();
        assert_eq!(json, "\"short\"");
    }

    #[test]
    fn test_list_fields_default_to_empty() {
        let record: FinancialRecord = serde_json::from_value(serde_json::json!({
            "summary": "quiet session",
            "market_overview": {"date": "2025-09-10", "market_sentiment": "neutral"},
        }))
        .unwrap();

        assert!(record.market_overview.major_indices.is_empty());
        assert!(record.macroeconomic_data.is_empty());
        assert!(record.stock_analysis.is_empty());
        assert!(record.key_events.is_empty());
        assert!(record.investment_advice.is_empty());
        assert!(record.risks_and_warnings.is_empty());
    }

    #[test]
    fn test_chinese_timeframe_translates_at_boundary() {
        let advice: AdviceEntry = serde_json::from_value(serde_json::json!({
            "advice": "逢低买入半导体",
            "timeframe": "中期",
        }))
        .unwrap();
        assert_eq!(advice.timeframe, Timeframe::Medium);

        // Serialization always uses the neutral label.
        let json = serde_json::to_value(&advice).unwrap();
        assert_eq!(json["timeframe"], "medium");
    }
}
