//! Extract and reprocess commands: run extraction on text already on hand.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::{FinsightError, Result};
use crate::orchestrator::Pipeline;
use chrono::NaiveDate;
use std::path::Path;

/// Extract a record from a plain-text transcript file.
pub async fn run_extract(
    transcript_path: &str,
    title: Option<String>,
    id: Option<String>,
    date: Option<String>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Extract)?;

    let path = Path::new(transcript_path);
    let text = std::fs::read_to_string(path).map_err(|e| {
        FinsightError::InvalidInput(format!("Cannot read transcript {transcript_path}: {e}"))
    })?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("transcript")
        .to_string();
    let title = title.unwrap_or_else(|| stem.clone());
    let id = id.unwrap_or(stem);
    let date = parse_date(date.as_deref())?;

    let pipeline = Pipeline::new(settings)?;
    if !pipeline.llm_enabled() {
        Output::warning("LLM gateway not configured; using rule-based extraction");
    }

    Output::info(&format!("Extracting from {transcript_path}"));
    let outcome = pipeline
        .process_transcript(&text, &title, &id, date, None)
        .await?;

    finish(outcome)
}

/// Re-run extraction from a transcript stored by a previous analysis.
pub async fn run_reprocess(id: &str, date: &str, settings: Settings) -> Result<()> {
    preflight::check(Operation::Extract)?;

    let date = parse_date(Some(date))?;
    let pipeline = Pipeline::new(settings)?;

    Output::info(&format!("Reprocessing {id} ({date})"));
    let outcome = pipeline.reprocess(date, id).await?;

    finish(outcome)
}

fn parse_date(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| FinsightError::InvalidInput(format!("Invalid date (want YYYY-MM-DD): {s}"))),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn finish(outcome: crate::orchestrator::ProcessOutcome) -> Result<()> {
    Output::success(&format!("Extracted '{}'", outcome.title));

    if let Some(path) = &outcome.record_path {
        Output::kv("record", &path.display().to_string());

        let content = std::fs::read_to_string(path)?;
        let record = serde_json::from_str(&content)?;
        Output::record_summary(&record);
    }

    Ok(())
}
