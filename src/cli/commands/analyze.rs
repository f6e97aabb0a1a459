//! Analyze command: one media input end to end.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use crate::orchestrator::Pipeline;

pub async fn run_analyze(input: &str, force: bool, settings: Settings) -> Result<()> {
    preflight::check(Operation::Analyze)?;

    let pipeline = Pipeline::new(settings)?;

    if !pipeline.llm_enabled() {
        Output::warning(
            "LLM gateway not configured (GEMINI_API_KEY); records will use rule-based extraction",
        );
    }

    Output::info(&format!("Analyzing {input}"));
    let outcome = pipeline.process_media(input, force).await?;

    if outcome.skipped {
        Output::info(&format!(
            "'{}' already analyzed, skipping (use --force to redo)",
            outcome.media_id
        ));
        return Ok(());
    }

    Output::success(&format!("Analyzed '{}'", outcome.title));

    if let Some(path) = &outcome.record_path {
        Output::kv("record", &path.display().to_string());

        let content = std::fs::read_to_string(path)?;
        let record = serde_json::from_str(&content)?;
        Output::record_summary(&record);
    }

    Ok(())
}
