//! CLI module for Finsight.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Finsight - structured investment records from spoken commentary
///
/// Downloads financial commentary videos, transcribes the audio, and
/// extracts structured investment information into per-day JSON records.
#[derive(Parser, Debug)]
#[command(name = "finsight")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze one video or audio file end to end
    Analyze {
        /// YouTube URL/ID, or local audio/video file path
        input: String,

        /// Force re-processing even if a record already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Extract a record from an existing transcript file
    Extract {
        /// Path to a plain-text transcript file
        transcript: String,

        /// Title fed to the extraction prompt (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,

        /// Record ID (defaults to the file name)
        #[arg(long)]
        id: Option<String>,

        /// Record date as YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Re-run extraction from a stored transcript
    Reprocess {
        /// Media ID of the stored transcript
        id: String,

        /// Date the transcript was stored under (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
    },

    /// Analyze many videos: a file of URLs, or a playlist/channel
    Batch {
        /// Path to a file with one URL per line, or a playlist/channel URL
        input: String,

        /// Treat input as a playlist/channel URL
        #[arg(long)]
        playlist: bool,

        /// Maximum number of videos to take from a playlist
        #[arg(long)]
        limit: Option<usize>,

        /// Force re-processing of already-analyzed videos
        #[arg(short, long)]
        force: bool,
    },

    /// Summarize the stored records for one day
    Aggregate {
        /// Date as YYYY-MM-DD (defaults to the most recent day with records)
        date: Option<String>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
