//! Configuration settings for Finsight.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub transcription: TranscriptionSettings,
    pub gateway: GatewaySettings,
    pub batch: BatchSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data (records, transcripts).
    pub data_dir: String,
    /// Directory for temporary files (downloaded audio).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.finsight".to_string(),
            temp_dir: "/tmp/finsight".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whisper model to use. This is the quality/size knob: larger models
    /// transcribe mixed Chinese/English commentary more accurately.
    pub model: String,
    /// Duration in seconds for splitting long audio files.
    pub chunk_duration_seconds: u32,
    /// Maximum media duration to process (in seconds).
    pub max_duration_seconds: u32,
    /// Maximum concurrent chunk transcriptions.
    pub max_concurrent_chunks: usize,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            chunk_duration_seconds: 120,
            max_duration_seconds: 7200, // 2 hours
            max_concurrent_chunks: 3,
        }
    }
}

/// LLM gateway settings. The API key itself comes from the environment
/// (GEMINI_API_KEY), never from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Whether the LLM extraction path is enabled at all.
    pub enabled: bool,
    /// Model name.
    pub model: String,
    /// Whole-call timeout in seconds.
    pub timeout_seconds: u64,
    /// Extraction retry ceiling.
    pub max_attempts: u32,
    /// Sampling temperature for extraction. Near-deterministic by default.
    pub temperature: f32,
    /// Output token ceiling per call.
    pub max_output_tokens: u32,
    /// Reasoning/thinking token budget per call.
    pub reasoning_budget: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gemini-2.5-pro".to_string(),
            timeout_seconds: 120,
            max_attempts: 3,
            temperature: 0.1,
            max_output_tokens: 8000,
            reasoning_budget: 8000,
        }
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Maximum concurrent pipeline runs across different videos. Each
    /// individual extraction stays strictly sequential.
    pub max_concurrent: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { max_concurrent: 2 }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::FinsightError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("finsight")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Directory holding persisted financial records, one per analysis.
    pub fn records_dir(&self) -> PathBuf {
        self.data_dir().join("analysis")
    }

    /// Directory holding raw transcripts for later reprocessing.
    pub fn transcripts_dir(&self) -> PathBuf {
        self.data_dir().join("transcripts")
    }

    /// The Gemini API key from the environment, if configured.
    pub fn gemini_api_key() -> Option<String> {
        std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let settings = Settings::default();
        assert!(settings.gateway.enabled);
        assert_eq!(settings.gateway.max_attempts, 3);
        assert_eq!(settings.gateway.timeout_seconds, 120);
        assert_eq!(settings.transcription.model, "whisper-1");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [gateway]
            model = "gemini-2.5-flash"
            "#,
        )
        .unwrap();

        assert_eq!(settings.gateway.model, "gemini-2.5-flash");
        assert_eq!(settings.gateway.max_attempts, 3);
        assert_eq!(settings.batch.max_concurrent, 2);
    }
}
