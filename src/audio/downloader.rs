//! Audio download and processing utilities.
//!
//! Downloads audio from URLs with yt-dlp and prepares it for transcription
//! with ffmpeg.

use crate::error::{FinsightError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Downloads audio from a URL and saves it as MP3.
///
/// If the file already exists it is returned without re-downloading.
#[instrument(skip(output_dir), fields(media_id = %media_id))]
pub async fn download_audio(url: &str, media_id: &str, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let target_path = output_dir.join(format!("{media_id}.mp3"));

    if target_path.exists() {
        info!("Using cached audio file");
        return Ok(target_path);
    }

    info!("Downloading audio from {}", url);

    let template = output_dir.join(format!("{media_id}.%(ext)s"));

    let result = Command::new("yt-dlp")
        .arg("--extract-audio")
        .arg("--audio-format").arg("mp3")
        .arg("--audio-quality").arg("0")
        .arg("--output").arg(template.to_str().unwrap_or_default())
        .arg("--no-playlist")
        .arg("--quiet")
        .arg("--no-warnings")
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FinsightError::ToolNotFound("yt-dlp".into()));
        }
        Err(e) => {
            return Err(FinsightError::AudioDownload(format!("yt-dlp execution failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FinsightError::AudioDownload(format!("yt-dlp failed: {stderr}")));
    }

    // yt-dlp may produce a different container; normalize to mp3.
    let downloaded = find_audio_file(output_dir, media_id)?;

    if downloaded != target_path {
        convert_to_mp3(&downloaded, &target_path).await?;
        let _ = std::fs::remove_file(&downloaded);
    }

    Ok(target_path)
}

/// Prepares a local media file for transcription, extracting its audio into
/// the output directory. An mp3 source is used in place (and must not be
/// deleted by callers).
pub async fn prepare_local_audio(source: &str, media_id: &str, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let source_path = Path::new(source);
    if !source_path.exists() {
        return Err(FinsightError::MediaNotFound(source.to_string()));
    }

    if source_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mp3"))
    {
        return Ok(source_path.to_path_buf());
    }

    let target = output_dir.join(format!("{media_id}.mp3"));
    if target.exists() {
        return Ok(target);
    }

    convert_to_mp3(source_path, &target).await?;
    Ok(target)
}

/// Locates a downloaded audio file by media ID.
fn find_audio_file(dir: &Path, media_id: &str) -> Result<PathBuf> {
    for ext in &["mp3", "opus", "m4a", "webm", "ogg"] {
        let candidate = dir.join(format!("{media_id}.{ext}"));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| FinsightError::AudioDownload(format!("Cannot read directory: {e}")))?;

    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(media_id) {
            return Ok(entry.path());
        }
    }

    Err(FinsightError::AudioDownload("Audio file not found after download".into()))
}

/// Converts an audio file to MP3 using ffmpeg.
async fn convert_to_mp3(source: &Path, dest: &Path) -> Result<()> {
    debug!("Converting {:?} to MP3", source);

    run_ffmpeg(&[
        "-i", &source.to_string_lossy(),
        "-vn",
        "-codec:a", "libmp3lame",
        "-qscale:a", "2",
        "-y",
        "-loglevel", "error",
        &dest.to_string_lossy(),
    ])
    .await
}

/// Segments a long audio file into smaller chunks for transcription.
///
/// Returns (chunk_path, offset_seconds) tuples in playback order. Short
/// audio is returned as a single segment pointing at the source file.
#[instrument(skip_all)]
pub async fn split_audio(
    source: &Path,
    output_dir: &Path,
    chunk_seconds: u32,
) -> Result<Vec<(PathBuf, f64)>> {
    std::fs::create_dir_all(output_dir)?;

    let total_duration = probe_duration(source).await?;
    info!("Total audio duration: {:.1}s", total_duration);

    let chunk_len = chunk_seconds.max(1) as f64;

    if total_duration <= chunk_len {
        return Ok(vec![(source.to_path_buf(), 0.0)]);
    }

    let base_name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");

    let mut segments = Vec::new();
    let mut offset = 0.0;
    let mut idx = 0u32;

    while offset < total_duration {
        let segment_path = output_dir.join(format!("{base_name}_{idx:04}.mp3"));
        let length = chunk_len.min(total_duration - offset);

        run_ffmpeg(&[
            "-ss", &format!("{offset:.3}"),
            "-i", &source.to_string_lossy(),
            "-t", &format!("{length:.3}"),
            "-codec:a", "libmp3lame",
            "-qscale:a", "2",
            "-y",
            "-loglevel", "error",
            &segment_path.to_string_lossy(),
        ])
        .await?;

        debug!("Created segment {} at offset {:.1}s", idx, offset);
        segments.push((segment_path, offset));

        offset += chunk_len;
        idx += 1;
    }

    info!("Created {} audio segments", segments.len());
    Ok(segments)
}

/// Queries the duration of an audio file using ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FinsightError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(FinsightError::AudioDownload(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(FinsightError::AudioDownload("ffprobe returned error".into()));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| FinsightError::AudioDownload("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| FinsightError::AudioDownload("Could not determine audio duration".into()))
}

/// Runs ffmpeg with the given arguments, mapping failure modes.
async fn run_ffmpeg(args: &[&str]) -> Result<()> {
    let result = Command::new("ffmpeg")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(FinsightError::ToolFailed(format!("ffmpeg: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FinsightError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(FinsightError::AudioDownload(format!("ffmpeg error: {e}"))),
    }
}
