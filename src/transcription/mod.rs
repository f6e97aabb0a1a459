//! Speech-to-text transcription.
//!
//! The pipeline only needs plain text plus the detected language; timestamps
//! and word alignment are out of scope. Quality/size is chosen by the model
//! configured at construction.

mod whisper;

pub use whisper::{is_api_key_configured, WhisperTranscriber};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of transcribing one audio file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptText {
    /// Full transcript text.
    pub text: String,
    /// Language reported by the transcription backend (e.g. "zh", "en").
    pub detected_language: Option<String>,
}

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file to plain text.
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscriptText>;

    /// Transcribe an audio file with a language hint (ISO 639-1 code).
    async fn transcribe_with_language(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<TranscriptText>;
}
