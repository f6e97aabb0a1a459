//! Pipeline orchestrator.
//!
//! Coordinates the entire process from audio download to persisted record:
//! fetch metadata → download audio → transcribe → extract → save. The
//! extraction step itself never fails; pipeline errors come only from the
//! stages before it (and from persisting the result).

use crate::audio::{download_audio, prepare_local_audio};
use crate::audio_source::{parse_input, SourceType};
use crate::config::{Prompts, Settings};
use crate::error::{FinsightError, Result};
use crate::extraction::{
    CancelFlag, ExtractionMethod, ExtractionRequest, ExtractorOptions, FinancialExtractor,
};
use crate::gateway::{GeminiConfig, GeminiGateway, LlmGateway};
use crate::store::{RecordStore, StoredTranscript};
use crate::transcription::{Transcriber, WhisperTranscriber};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// The main orchestrator for the Finsight pipeline.
pub struct Pipeline {
    settings: Settings,
    transcriber: Arc<dyn Transcriber>,
    extractor: FinancialExtractor,
    store: RecordStore,
    temp_dir: PathBuf,
}

impl Pipeline {
    /// Create a pipeline from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_cancel_flag(settings, CancelFlag::new())
    }

    /// Create a pipeline whose extraction loop observes a cancellation flag.
    pub fn with_cancel_flag(settings: Settings, cancel: CancelFlag) -> Result<Self> {
        // An unreadable or invalid prompt template is a configuration error
        // for the LLM path: log once, fall back to rule-based extraction for
        // the rest of the process.
        let (prompts, prompts_ok) = match Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        ) {
            Ok(p) => (p, true),
            Err(e) => {
                error!(error = %e, "Failed to load extraction prompts; disabling LLM extraction");
                (Prompts::default(), false)
            }
        };

        let gateway = if prompts_ok {
            Self::build_gateway(&settings)
        } else {
            None
        };

        let extractor = FinancialExtractor::new(gateway, prompts)
            .with_options(ExtractorOptions::from(&settings.gateway))
            .with_cancel_flag(cancel);

        let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperTranscriber::with_config(
            &settings.transcription.model,
            settings.transcription.chunk_duration_seconds,
            settings.transcription.max_concurrent_chunks,
        )?);

        let store = RecordStore::new(settings.data_dir());

        let temp_dir = settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        Ok(Self { settings, transcriber, extractor, store, temp_dir })
    }

    /// Create a pipeline with custom components (used by tests).
    pub fn with_components(
        settings: Settings,
        transcriber: Arc<dyn Transcriber>,
        extractor: FinancialExtractor,
        store: RecordStore,
    ) -> Result<Self> {
        let temp_dir = settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        Ok(Self { settings, transcriber, extractor, store, temp_dir })
    }

    fn build_gateway(settings: &Settings) -> Option<Arc<dyn LlmGateway>> {
        if !settings.gateway.enabled {
            info!("LLM extraction disabled in configuration");
            return None;
        }

        let Some(api_key) = Settings::gemini_api_key() else {
            warn!("GEMINI_API_KEY not set; extraction will use the rule-based fallback");
            return None;
        };

        let config = GeminiConfig::new(api_key)
            .with_model(&settings.gateway.model)
            .with_timeout_secs(settings.gateway.timeout_seconds);

        match GeminiGateway::new(config) {
            Ok(gateway) => Some(Arc::new(gateway)),
            Err(e) => {
                error!(error = %e, "Failed to construct LLM gateway; using rule-based fallback");
                None
            }
        }
    }

    /// Whether the LLM extraction path is active.
    pub fn llm_enabled(&self) -> bool {
        self.extractor.llm_enabled()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the record store (for the aggregation consumer).
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Process one media input end to end: download, transcribe, extract,
    /// persist. Returns where the record landed.
    #[instrument(skip(self), fields(input = %input))]
    pub async fn process_media(&self, input: &str, force: bool) -> Result<ProcessOutcome> {
        let (source, media_id) = parse_input(input)
            .ok_or_else(|| FinsightError::InvalidInput(format!("Could not parse input: {input}")))?;

        info!("Fetching metadata for {}", media_id);
        let metadata = source.fetch_media(&media_id).await?;

        let date = metadata
            .published_at
            .map(|dt| dt.date_naive())
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        if !force && self.store.record_path(date, &metadata.id).exists() {
            info!("Record for {} already exists, skipping", metadata.id);
            return Ok(ProcessOutcome {
                media_id: metadata.id,
                title: metadata.title,
                record_path: None,
                extraction_method: None,
                skipped: true,
            });
        }

        if let Some(duration) = metadata.duration_seconds {
            if duration > self.settings.transcription.max_duration_seconds {
                return Err(FinsightError::InvalidInput(format!(
                    "Media duration ({duration} seconds) exceeds maximum ({} seconds)",
                    self.settings.transcription.max_duration_seconds
                )));
            }
        }

        info!("Preparing audio for: {}", metadata.title);
        let audio_path = match metadata.source_type {
            SourceType::YouTube => {
                download_audio(&metadata.source_url, &metadata.id, &self.temp_dir).await?
            }
            SourceType::Local => {
                prepare_local_audio(&metadata.source_url, &metadata.id, &self.temp_dir).await?
            }
        };

        info!("Transcribing audio...");
        let transcript = self.transcriber.transcribe(&audio_path).await?;

        // Keep the raw transcript so the analysis can be reprocessed later
        // without re-downloading.
        let stored = StoredTranscript {
            id: metadata.id.clone(),
            title: metadata.title.clone(),
            text: transcript.text.clone(),
            detected_language: transcript.detected_language.clone(),
        };
        if let Err(e) = self.store.save_transcript(date, &stored) {
            warn!("Failed to store transcript (reprocessing won't be available): {}", e);
        }

        let outcome = self
            .extract_and_save(&transcript.text, &metadata.title, &metadata.id, date, transcript.detected_language.as_deref())
            .await?;

        // Only clean up audio we produced; a local mp3 is used in place.
        if audio_path.starts_with(&self.temp_dir) {
            if let Err(e) = std::fs::remove_file(&audio_path) {
                warn!("Failed to cleanup audio file: {}", e);
            }
        }

        Ok(outcome)
    }

    /// Extract from transcript text that is already on hand and persist the
    /// record under the given date/id.
    pub async fn process_transcript(
        &self,
        text: &str,
        title: &str,
        id: &str,
        date: NaiveDate,
        language_hint: Option<&str>,
    ) -> Result<ProcessOutcome> {
        self.extract_and_save(text, title, id, date, language_hint).await
    }

    /// Re-run extraction from a stored transcript (no download, no ASR).
    #[instrument(skip(self))]
    pub async fn reprocess(&self, date: NaiveDate, id: &str) -> Result<ProcessOutcome> {
        let transcript = self.store.load_transcript(date, id)?;
        info!("Reprocessing '{}' from stored transcript", transcript.title);

        self.extract_and_save(
            &transcript.text,
            &transcript.title,
            &transcript.id,
            date,
            transcript.detected_language.as_deref(),
        )
        .await
    }

    async fn extract_and_save(
        &self,
        text: &str,
        title: &str,
        id: &str,
        date: NaiveDate,
        language_hint: Option<&str>,
    ) -> Result<ProcessOutcome> {
        let mut request = ExtractionRequest::new(text, title)
            .map_err(|_| FinsightError::Transcription("transcription produced no text".into()))?;
        if let Some(lang) = language_hint {
            request = request.with_language_hint(lang);
        }

        let record = self.extractor.extract(&request).await;
        let method = record.extraction_method;
        let path = self.store.save(date, id, &record)?;

        Ok(ProcessOutcome {
            media_id: id.to_string(),
            title: title.to_string(),
            record_path: Some(path),
            extraction_method: Some(method),
            skipped: false,
        })
    }
}

/// Result of processing one media input.
#[derive(Debug)]
pub struct ProcessOutcome {
    /// Media ID.
    pub media_id: String,
    /// Title.
    pub title: String,
    /// Where the record was persisted (None when skipped).
    pub record_path: Option<PathBuf>,
    /// How the record was extracted (None when skipped).
    pub extraction_method: Option<ExtractionMethod>,
    /// Whether processing was skipped (record already exists).
    pub skipped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::TranscriptText;
    use async_trait::async_trait;
    use std::path::Path;

    struct FixedTranscriber;

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> Result<TranscriptText> {
            Ok(TranscriptText {
                text: "NVDA rose 3% to $120".to_string(),
                detected_language: Some("en".to_string()),
            })
        }

        async fn transcribe_with_language(
            &self,
            audio_path: &Path,
            _language: &str,
        ) -> Result<TranscriptText> {
            self.transcribe(audio_path).await
        }
    }

    fn test_pipeline(data_dir: &Path) -> Pipeline {
        let mut settings = Settings::default();
        settings.general.data_dir = data_dir.to_string_lossy().to_string();
        settings.general.temp_dir = data_dir.join("tmp").to_string_lossy().to_string();

        // No gateway: extraction degrades to the rule-based path.
        let extractor = FinancialExtractor::new(None, Prompts::default());
        let store = RecordStore::new(data_dir);

        Pipeline::with_components(settings, Arc::new(FixedTranscriber), extractor, store).unwrap()
    }

    #[tokio::test]
    async fn test_process_transcript_persists_rule_based_record() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path());
        let date = NaiveDate::from_ymd_opt(2025, 9, 10).unwrap();

        let outcome = pipeline
            .process_transcript("NVDA rose 3% to $120", "Tech Update", "vid1", date, Some("en"))
            .await
            .unwrap();

        assert!(!outcome.skipped);
        assert_eq!(outcome.extraction_method, Some(ExtractionMethod::RuleBased));

        let loaded = pipeline.store().load(date, "vid1").unwrap();
        assert_eq!(loaded.extraction_method, ExtractionMethod::RuleBased);
        assert!(loaded.stocks_mentioned.contains(&"NVDA".to_string()));
    }

    #[tokio::test]
    async fn test_empty_transcript_is_a_pipeline_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path());
        let date = NaiveDate::from_ymd_opt(2025, 9, 10).unwrap();

        let result = pipeline
            .process_transcript("   ", "Tech Update", "vid1", date, None)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reprocess_from_stored_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path());
        let date = NaiveDate::from_ymd_opt(2025, 9, 10).unwrap();

        let stored = StoredTranscript {
            id: "vid2".to_string(),
            title: "复盘".to_string(),
            text: "特斯拉 up 5% to $300".to_string(),
            detected_language: Some("zh".to_string()),
        };
        pipeline.store().save_transcript(date, &stored).unwrap();

        let outcome = pipeline.reprocess(date, "vid2").await.unwrap();

        assert_eq!(outcome.title, "复盘");
        let loaded = pipeline.store().load(date, "vid2").unwrap();
        assert!(loaded.stocks_mentioned.contains(&"TSLA".to_string()));
    }
}
