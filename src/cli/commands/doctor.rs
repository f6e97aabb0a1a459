//! Doctor command: check system requirements and configuration.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use crate::transcription::is_api_key_configured;

pub fn run_doctor(settings: &Settings) -> Result<()> {
    Output::header("Finsight doctor");
    let mut problems = 0;

    for tool in ["yt-dlp", "ffmpeg", "ffprobe"] {
        match preflight::check_tool(tool) {
            Ok(()) => Output::kv(tool, "ok"),
            Err(e) => {
                Output::kv(tool, "MISSING");
                Output::error(&e.to_string());
                problems += 1;
            }
        }
    }

    if is_api_key_configured() {
        Output::kv("OPENAI_API_KEY", "set (transcription available)");
    } else {
        Output::kv("OPENAI_API_KEY", "NOT SET");
        Output::error("Transcription requires OPENAI_API_KEY");
        problems += 1;
    }

    if Settings::gemini_api_key().is_some() {
        Output::kv("GEMINI_API_KEY", "set (LLM extraction available)");
    } else {
        // Not fatal: extraction degrades to the rule-based path.
        Output::kv("GEMINI_API_KEY", "not set (rule-based extraction only)");
    }

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::kv("config", &config_path.display().to_string());
    } else {
        Output::kv("config", "using built-in defaults");
    }
    Output::kv("data dir", &settings.data_dir().display().to_string());
    Output::kv("gateway model", &settings.gateway.model);
    Output::kv("whisper model", &settings.transcription.model);

    if problems == 0 {
        Output::success("All checks passed");
    } else {
        Output::warning(&format!("{problems} problem(s) found"));
    }

    Ok(())
}
