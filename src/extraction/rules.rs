//! Deterministic keyword/pattern extraction, used when the LLM path is
//! unavailable or exhausted.
//!
//! Pure functions over the transcript text: no I/O, no failure mode, same
//! output for the same input every time.

use super::schema::{FinancialRecord, MarketOverview};
use regex::Regex;
use std::sync::LazyLock;

/// Upper bound on informational list lengths in the degraded record.
const MAX_MATCHES: usize = 10;

/// Ticker-like tokens: 1-5 uppercase letters on word boundaries.
static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{1,5}\b").expect("invalid ticker regex"));

/// Percentages, dollar amounts, and CJK currency units, in one alternation
/// so matches come back in order of first occurrence.
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+\.?\d*%|\$\d+\.?\d*|\b\d{1,4}\.?\d*块|\b\d+\.?\d*美元|\b\d+\.?\d*亿")
        .expect("invalid number regex")
});

/// Company names (English and Chinese) mapped to their exchange tickers.
const KNOWN_COMPANIES: &[(&str, &str)] = &[
    ("Tesla", "TSLA"),
    ("特斯拉", "TSLA"),
    ("Apple", "AAPL"),
    ("苹果", "AAPL"),
    ("Google", "GOOGL"),
    ("谷歌", "GOOGL"),
    ("Microsoft", "MSFT"),
    ("微软", "MSFT"),
    ("Amazon", "AMZN"),
    ("亚马逊", "AMZN"),
    ("Nvidia", "NVDA"),
    ("英伟达", "NVDA"),
    ("Meta", "META"),
    ("Broadcom", "AVGO"),
    ("博通", "AVGO"),
];

/// Common English words that look like tickers but aren't.
const STOPLIST: &[&str] = &[
    "AND", "THE", "FOR", "ARE", "YOU", "ALL", "BUT", "NOT", "CAN", "HAD", "HER", "WAS", "ONE",
    "OUR", "OUT", "DAY", "GET", "HAS", "HIM", "HIS", "HOW", "ITS", "NEW", "NOW", "OLD", "SEE",
    "TWO", "WHO", "BOY", "DID", "DOWN", "EACH", "FEW", "FROM", "HAVE", "HERE", "INTO", "JUST",
    "LIKE", "LONG", "MADE", "MANY", "OVER", "SUCH", "TAKE", "THAN", "THEM", "WELL", "WERE",
    "WHAT", "WITH", "WORK",
];

/// Result of the rule-based path. The orchestrator assembles the final
/// record and attaches the extraction method.
#[derive(Debug, Clone)]
pub struct BasicExtraction {
    pub record: FinancialRecord,
    pub stocks_mentioned: Vec<String>,
    pub numbers_found: Vec<String>,
    pub note: String,
}

/// Extract what simple rules can find. Every structured list is empty; the
/// informational fields carry the raw pattern matches.
pub fn extract_basic(transcript: &str, title: &str) -> BasicExtraction {
    let record = FinancialRecord {
        summary: format!("Financial commentary based on the video title: {title}"),
        market_overview: MarketOverview::default(),
        macroeconomic_data: Vec::new(),
        stock_analysis: Vec::new(),
        key_events: Vec::new(),
        investment_advice: Vec::new(),
        risks_and_warnings: Vec::new(),
    };

    BasicExtraction {
        record,
        stocks_mentioned: extract_stock_symbols(transcript),
        numbers_found: extract_numbers(transcript),
        note: "Extracted with basic rules only; limited detail. Configure the LLM gateway \
               for full analysis."
            .to_string(),
    }
}

/// Ticker-like tokens in order of first occurrence, plus known company
/// names mapped to their tickers, minus the stoplist. Deduplicated, capped.
fn extract_stock_symbols(text: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();

    for m in TICKER_RE.find_iter(text) {
        let token = m.as_str();
        if STOPLIST.contains(&token) {
            continue;
        }
        if !symbols.iter().any(|s| s == token) {
            symbols.push(token.to_string());
        }
    }

    for (name, ticker) in KNOWN_COMPANIES {
        if text.contains(name) && !symbols.iter().any(|s| s == ticker) {
            symbols.push((*ticker).to_string());
        }
    }

    symbols.truncate(MAX_MATCHES);
    symbols
}

/// Price and percentage strings in order of first occurrence, capped.
fn extract_numbers(text: &str) -> Vec<String> {
    NUMBER_RE
        .find_iter(text)
        .take(MAX_MATCHES)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_company_and_numbers() {
        let out = extract_basic("Tesla hit $300, up 5%", "t");

        assert!(out.stocks_mentioned.contains(&"TSLA".to_string()));
        assert!(out.numbers_found.contains(&"$300".to_string()));
        assert!(out.numbers_found.contains(&"5%".to_string()));
    }

    #[test]
    fn test_deterministic_across_calls() {
        let text = "NVDA and AAPL both rallied; 特斯拉 rose 3.5% to $412.5";
        let a = extract_basic(text, "daily wrap");
        let b = extract_basic(text, "daily wrap");

        assert_eq!(a.stocks_mentioned, b.stocks_mentioned);
        assert_eq!(a.numbers_found, b.numbers_found);
    }

    #[test]
    fn test_stoplist_filters_common_words() {
        let out = extract_basic("THE MARKET AND NVDA WERE UP", "t");

        assert!(out.stocks_mentioned.contains(&"NVDA".to_string()));
        assert!(!out.stocks_mentioned.contains(&"THE".to_string()));
        assert!(!out.stocks_mentioned.contains(&"AND".to_string()));
        assert!(!out.stocks_mentioned.contains(&"WERE".to_string()));
    }

    #[test]
    fn test_symbols_deduplicated_and_capped() {
        let text = "NVDA NVDA NVDA A B C D E F G H I J K L";
        let out = extract_basic(text, "t");

        let nvda_count = out.stocks_mentioned.iter().filter(|s| *s == "NVDA").count();
        assert_eq!(nvda_count, 1);
        assert_eq!(out.stocks_mentioned.len(), 10);
    }

    #[test]
    fn test_cjk_currency_units() {
        let out = extract_basic("这只股票涨到 120美元, 市值超过 3000亿, 大概 800块", "t");

        assert!(out.numbers_found.contains(&"120美元".to_string()));
        assert!(out.numbers_found.contains(&"3000亿".to_string()));
        assert!(out.numbers_found.contains(&"800块".to_string()));
    }

    #[test]
    fn test_numbers_in_first_occurrence_order() {
        let out = extract_basic("down 2% then $15 then 7%", "t");
        assert_eq!(out.numbers_found, vec!["2%", "$15", "7%"]);
    }

    #[test]
    fn test_structured_lists_are_empty() {
        let out = extract_basic("Tesla hit $300", "title");

        assert!(out.record.macroeconomic_data.is_empty());
        assert!(out.record.stock_analysis.is_empty());
        assert!(out.record.key_events.is_empty());
        assert!(out.record.investment_advice.is_empty());
        assert!(out.record.risks_and_warnings.is_empty());
        assert!(out.record.market_overview.date.is_empty());
        assert!(out.record.summary.contains("title"));
    }
}
