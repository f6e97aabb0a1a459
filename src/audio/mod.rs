//! Audio acquisition and processing.

mod downloader;

pub use downloader::{download_audio, prepare_local_audio, probe_duration, split_audio};
