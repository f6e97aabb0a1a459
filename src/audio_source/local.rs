//! Local file source implementation.
//!
//! Supports both audio and video files; audio is extracted downstream.

use super::{AudioSource, MediaMetadata, SourceType};
use crate::error::{FinsightError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Supported audio file extensions.
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "opus", "m4a", "wma",
];

/// Supported video file extensions (audio will be extracted).
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v",
];

/// Local file source for audio and video files.
pub struct LocalSource;

impl LocalSource {
    pub fn new() -> Self {
        Self
    }

    fn is_media_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                AUDIO_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    /// Get duration and embedded title using ffprobe. Missing metadata is
    /// not an error; transcription can proceed without it.
    async fn probe_metadata(path: &Path) -> Result<(Option<u32>, Option<String>)> {
        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                path.to_str().unwrap_or(""),
            ])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    FinsightError::ToolNotFound("ffprobe".to_string())
                } else {
                    FinsightError::MediaSource(format!("Failed to run ffprobe: {e}"))
                }
            })?;

        if !output.status.success() {
            return Ok((None, None));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str).unwrap_or_default();

        let duration = json["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .map(|d| d as u32);

        let title = json["format"]["tags"]["title"].as_str().map(|s| s.to_string());

        Ok((duration, title))
    }
}

impl Default for LocalSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSource for LocalSource {
    fn source_type(&self) -> SourceType {
        SourceType::Local
    }

    async fn fetch_media(&self, id: &str) -> Result<MediaMetadata> {
        let path = Path::new(id);

        if !path.exists() {
            return Err(FinsightError::MediaNotFound(format!("File not found: {id}")));
        }

        if !Self::is_media_file(path) {
            return Err(FinsightError::InvalidInput(format!(
                "Not a recognized audio or video file: {id}"
            )));
        }

        let (duration, metadata_title) = Self::probe_metadata(path).await?;

        let title = metadata_title.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string()
        });

        // Stable ID derived from the file path
        let media_id = format!(
            "local_{}",
            path.canonicalize()
                .unwrap_or_else(|_| path.to_path_buf())
                .to_string_lossy()
                .replace(['/', '\\', ' '], "_")
        );

        Ok(MediaMetadata {
            id: media_id,
            title,
            description: None,
            duration_seconds: duration,
            source_type: SourceType::Local,
            source_url: path
                .canonicalize()
                .unwrap_or_else(|_| path.to_path_buf())
                .to_string_lossy()
                .to_string(),
            published_at: None,
            channel: None,
        })
    }

    async fn list_media(&self, source: &str, limit: Option<usize>) -> Result<Vec<MediaMetadata>> {
        let path = Path::new(source);

        if !path.is_dir() {
            return Err(FinsightError::InvalidInput(format!("Not a directory: {source}")));
        }

        let limit = limit.unwrap_or(usize::MAX);
        let mut media_files = Vec::new();

        for entry in std::fs::read_dir(path)?.filter_map(|e| e.ok()) {
            if media_files.len() >= limit {
                break;
            }

            let entry_path = entry.path();
            if Self::is_media_file(&entry_path) {
                match self.fetch_media(entry_path.to_str().unwrap_or("")).await {
                    Ok(metadata) => media_files.push(metadata),
                    Err(e) => {
                        tracing::warn!("Failed to get metadata for {:?}: {}", entry_path, e);
                    }
                }
            }
        }

        Ok(media_files)
    }

    fn can_handle(&self, input: &str) -> bool {
        let path = Path::new(input);
        path.exists() && Self::is_media_file(path)
    }

    fn extract_id(&self, input: &str) -> Option<String> {
        self.can_handle(input).then(|| input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_media_file() {
        assert!(LocalSource::is_media_file(Path::new("audio.mp3")));
        assert!(LocalSource::is_media_file(Path::new("audio.WAV")));
        assert!(LocalSource::is_media_file(Path::new("video.mp4")));
        assert!(LocalSource::is_media_file(Path::new("video.MKV")));
        assert!(!LocalSource::is_media_file(Path::new("document.pdf")));
        assert!(!LocalSource::is_media_file(Path::new("no_extension")));
    }
}
