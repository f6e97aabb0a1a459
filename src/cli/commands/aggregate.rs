//! Aggregate command: a daily digest over persisted records.
//!
//! A pure consumer of the extraction output schema. Records were validated
//! when written, so they are merged here without per-record validation.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::{FinsightError, Result};
use crate::extraction::{ExtractedRecord, ExtractionMethod, Recommendation, RiskLevel, Timeframe};
use crate::store::RecordStore;
use chrono::NaiveDate;
use std::collections::HashMap;

pub async fn run_aggregate(date: Option<&str>, settings: Settings) -> Result<()> {
    let store = RecordStore::new(settings.data_dir());

    let date = match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            FinsightError::InvalidInput(format!("Invalid date (want YYYY-MM-DD): {s}"))
        })?,
        None => store
            .list_dates()?
            .pop()
            .ok_or_else(|| FinsightError::Store("no records stored yet".to_string()))?,
    };

    let records = store.load_all(date)?;
    if records.is_empty() {
        Output::warning(&format!("No records for {date}"));
        return Ok(());
    }

    let digest = build_digest(&records);

    Output::header(&format!("Digest for {date}"));
    Output::kv("records", &digest.total.to_string());
    Output::kv(
        "extraction",
        &format!("{} llm / {} rule-based", digest.llm_records, digest.rule_based_records),
    );
    if digest.tokens_used > 0 {
        Output::kv("tokens used", &digest.tokens_used.to_string());
    }

    if !digest.symbol_mentions.is_empty() {
        Output::header("Most mentioned symbols");
        for (symbol, count) in digest.symbol_mentions.iter().take(10) {
            Output::list_item(&format!("{symbol} ({count})"));
        }
    }

    if digest.buy_calls + digest.hold_calls + digest.sell_calls + digest.watch_calls > 0 {
        Output::header("Recommendations");
        Output::kv("buy", &digest.buy_calls.to_string());
        Output::kv("hold", &digest.hold_calls.to_string());
        Output::kv("sell", &digest.sell_calls.to_string());
        Output::kv("watch", &digest.watch_calls.to_string());
    }

    if digest.high_severity_risks > 0 {
        Output::warning(&format!(
            "{} high-severity risk(s) flagged today",
            digest.high_severity_risks
        ));
    }

    if digest.advice_short + digest.advice_medium + digest.advice_long > 0 {
        Output::header("Advice horizon");
        Output::kv("short", &digest.advice_short.to_string());
        Output::kv("medium", &digest.advice_medium.to_string());
        Output::kv("long", &digest.advice_long.to_string());
    }

    Ok(())
}

#[derive(Debug, Default)]
struct DailyDigest {
    total: usize,
    llm_records: usize,
    rule_based_records: usize,
    tokens_used: u64,
    /// (symbol, mentions), most mentioned first.
    symbol_mentions: Vec<(String, usize)>,
    buy_calls: usize,
    hold_calls: usize,
    sell_calls: usize,
    watch_calls: usize,
    high_severity_risks: usize,
    advice_short: usize,
    advice_medium: usize,
    advice_long: usize,
}

fn build_digest(records: &[(String, ExtractedRecord)]) -> DailyDigest {
    let mut digest = DailyDigest { total: records.len(), ..Default::default() };
    let mut mentions: HashMap<String, usize> = HashMap::new();

    for (_, record) in records {
        match record.extraction_method {
            ExtractionMethod::Llm => digest.llm_records += 1,
            ExtractionMethod::RuleBased => digest.rule_based_records += 1,
        }
        digest.tokens_used += record.tokens_used;

        for stock in &record.record.stock_analysis {
            *mentions.entry(stock.symbol.clone()).or_default() += 1;

            match stock.recommendation {
                Some(Recommendation::Buy) => digest.buy_calls += 1,
                Some(Recommendation::Hold) => digest.hold_calls += 1,
                Some(Recommendation::Sell) => digest.sell_calls += 1,
                Some(Recommendation::Watch) => digest.watch_calls += 1,
                None => {}
            }
        }

        // Rule-based records surface symbols only informationally.
        for symbol in &record.stocks_mentioned {
            *mentions.entry(symbol.clone()).or_default() += 1;
        }

        for risk in &record.record.risks_and_warnings {
            if risk.severity == RiskLevel::High {
                digest.high_severity_risks += 1;
            }
        }

        for advice in &record.record.investment_advice {
            match advice.timeframe {
                Timeframe::Short => digest.advice_short += 1,
                Timeframe::Medium => digest.advice_medium += 1,
                Timeframe::Long => digest.advice_long += 1,
            }
        }
    }

    let mut symbol_mentions: Vec<(String, usize)> = mentions.into_iter().collect();
    symbol_mentions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    digest.symbol_mentions = symbol_mentions;

    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{
        AdviceEntry, FinancialRecord, MarketOverview, RiskEntry, StockEntry,
    };

    fn llm_record(symbol: &str, recommendation: Option<Recommendation>) -> ExtractedRecord {
        ExtractedRecord {
            record: FinancialRecord {
                summary: "s".to_string(),
                market_overview: MarketOverview::default(),
                macroeconomic_data: vec![],
                stock_analysis: vec![StockEntry {
                    symbol: symbol.to_string(),
                    key_points: vec![],
                    company_name: None,
                    current_price: None,
                    price_change: None,
                    price_levels: None,
                    recommendation,
                    risk_reward_ratio: None,
                    analyst_notes: None,
                }],
                key_events: vec![],
                investment_advice: vec![AdviceEntry {
                    advice: "trim into strength".to_string(),
                    timeframe: Timeframe::Short,
                    rationale: None,
                    target_audience: None,
                }],
                risks_and_warnings: vec![RiskEntry {
                    risk: "concentration".to_string(),
                    severity: RiskLevel::High,
                    probability: None,
                    mitigation: None,
                }],
            },
            extraction_method: ExtractionMethod::Llm,
            tokens_used: 500,
            attempts_used: 1,
            stocks_mentioned: vec![],
            numbers_found: vec![],
            note: None,
        }
    }

    #[test]
    fn test_digest_counts() {
        let records = vec![
            ("a".to_string(), llm_record("NVDA", Some(Recommendation::Buy))),
            ("b".to_string(), llm_record("NVDA", Some(Recommendation::Hold))),
            ("c".to_string(), llm_record("TSLA", None)),
        ];

        let digest = build_digest(&records);

        assert_eq!(digest.total, 3);
        assert_eq!(digest.llm_records, 3);
        assert_eq!(digest.tokens_used, 1500);
        assert_eq!(digest.buy_calls, 1);
        assert_eq!(digest.hold_calls, 1);
        assert_eq!(digest.high_severity_risks, 3);
        assert_eq!(digest.advice_short, 3);
        assert_eq!(digest.symbol_mentions[0], ("NVDA".to_string(), 2));
    }

    #[test]
    fn test_digest_tie_breaks_symbols_alphabetically() {
        let records = vec![
            ("a".to_string(), llm_record("TSLA", None)),
            ("b".to_string(), llm_record("AAPL", None)),
        ];

        let digest = build_digest(&records);
        assert_eq!(digest.symbol_mentions[0].0, "AAPL");
        assert_eq!(digest.symbol_mentions[1].0, "TSLA");
    }
}
