//! Batch command: analyze many videos with bounded concurrency.
//!
//! Extractions run concurrently across different videos, but each video's
//! own retry loop stays strictly sequential. Ctrl-C sets the shared
//! cancellation flag, which is observed between extraction attempts.

use crate::audio_source::{AudioSource, YoutubeSource};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::{FinsightError, Result};
use crate::extraction::{CancelFlag, ExtractionMethod};
use crate::orchestrator::Pipeline;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::warn;

/// Per-item result reported to the caller. The extraction step itself never
/// fails, so `success = false` means an earlier stage (metadata, download,
/// transcription) broke; degraded extraction shows up as
/// `method = Some(RuleBased)` with `success = true`.
#[derive(Debug)]
pub struct ItemOutcome {
    pub input: String,
    pub success: bool,
    pub detail: String,
    pub method: Option<ExtractionMethod>,
}

pub async fn run_batch(
    input: &str,
    playlist: bool,
    limit: Option<usize>,
    force: bool,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Analyze)?;

    let inputs = collect_inputs(input, playlist, limit).await?;
    if inputs.is_empty() {
        Output::warning("Nothing to process");
        return Ok(());
    }

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received; finishing current attempts with rule-based fallback");
                cancel.cancel();
            }
        });
    }

    let max_concurrent = settings.batch.max_concurrent.max(1);
    let pipeline = Arc::new(Pipeline::with_cancel_flag(settings, cancel)?);

    if !pipeline.llm_enabled() {
        Output::warning("LLM gateway not configured; records will use rule-based extraction");
    }

    Output::info(&format!(
        "Processing {} videos ({} concurrent)",
        inputs.len(),
        max_concurrent
    ));
    let pb = Output::progress_bar(inputs.len() as u64, "analyzing");

    let outcomes: Vec<ItemOutcome> = stream::iter(inputs)
        .map(|url| {
            let pipeline = pipeline.clone();
            let pb = pb.clone();
            async move {
                let outcome = match pipeline.process_media(&url, force).await {
                    Ok(o) if o.skipped => ItemOutcome {
                        input: url,
                        success: true,
                        detail: "already analyzed".to_string(),
                        method: None,
                    },
                    Ok(o) => ItemOutcome {
                        input: url,
                        success: true,
                        detail: o.title,
                        method: o.extraction_method,
                    },
                    Err(e) => ItemOutcome {
                        input: url,
                        success: false,
                        detail: e.to_string(),
                        method: None,
                    },
                };
                pb.inc(1);
                outcome
            }
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    pb.finish_and_clear();
    report(&outcomes);

    Ok(())
}

/// Resolve the batch input into a list of video URLs/IDs.
async fn collect_inputs(
    input: &str,
    playlist: bool,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    if playlist {
        let source = YoutubeSource::new();
        let media = source.list_media(input, limit).await?;
        return Ok(media.into_iter().map(|m| m.source_url).collect());
    }

    let content = std::fs::read_to_string(input).map_err(|e| {
        FinsightError::InvalidInput(format!("Cannot read URL list {input}: {e}"))
    })?;

    let mut urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect();

    if let Some(limit) = limit {
        urls.truncate(limit);
    }

    Ok(urls)
}

fn report(outcomes: &[ItemOutcome]) {
    let succeeded = outcomes.iter().filter(|o| o.success).count();
    let degraded = outcomes
        .iter()
        .filter(|o| o.method == Some(ExtractionMethod::RuleBased))
        .count();

    Output::header("Batch summary");
    Output::kv("processed", &outcomes.len().to_string());
    Output::kv("succeeded", &succeeded.to_string());
    if degraded > 0 {
        Output::kv("rule-based fallbacks", &degraded.to_string());
    }

    for outcome in outcomes.iter().filter(|o| !o.success) {
        Output::error(&format!("{}: {}", outcome.input, outcome.detail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_inputs_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("urls.txt");
        std::fs::write(
            &list,
            "# daily channels\nhttps://youtu.be/ZKo41ja8rD0\n\nhttps://youtu.be/dQw4w9WgXcQ\n",
        )
        .unwrap();

        let urls = collect_inputs(list.to_str().unwrap(), false, None).await.unwrap();
        assert_eq!(urls.len(), 2);

        let limited = collect_inputs(list.to_str().unwrap(), false, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_collect_inputs_missing_file() {
        assert!(collect_inputs("/nonexistent/urls.txt", false, None).await.is_err());
    }
}
