//! Finsight - Structured Investment Records from Spoken Commentary
//!
//! A CLI tool that downloads financial commentary videos, transcribes the
//! audio, and extracts structured investment information (indices, macro
//! data, stock calls, risk flags) into per-day JSON records.
//!
//! # Overview
//!
//! Finsight allows you to:
//! - Analyze YouTube videos and local audio/video files
//! - Extract schema-validated financial records with an LLM, with retries
//!   and a deterministic rule-based fallback
//! - Reprocess stored transcripts without re-downloading
//! - Aggregate a day's records into a digest
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `audio_source` - Audio source abstraction (YouTube, local files)
//! - `audio` - Audio download and processing
//! - `transcription` - Speech-to-text transcription
//! - `gateway` - LLM gateway abstraction (Gemini)
//! - `extraction` - Schema, parser, retry orchestrator, rule-based fallback
//! - `store` - Flat-file record persistence
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use finsight::config::Settings;
//! use finsight::orchestrator::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(settings)?;
//!
//!     // Analyze one piece of financial commentary
//!     let outcome = pipeline.process_media("ZKo41ja8rD0", false).await?;
//!     println!("Record stored at {:?}", outcome.record_path);
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod audio_source;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod gateway;
pub mod orchestrator;
pub mod store;
pub mod transcription;

pub use error::{FinsightError, Result};
