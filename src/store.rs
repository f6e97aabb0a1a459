//! Flat-file persistence for extraction output.
//!
//! One record per UTF-8 JSON file, pretty-printed with non-ASCII characters
//! preserved unescaped, laid out `<data_dir>/analysis/<YYYY-MM-DD>/<id>.json`.
//! Raw transcripts are kept alongside under `transcripts/` so an analysis can
//! be reprocessed without re-downloading or re-transcribing.

use crate::error::{FinsightError, Result};
use crate::extraction::ExtractedRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// A transcript persisted for later reprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTranscript {
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
}

/// Store rooted at the application data directory.
pub struct RecordStore {
    data_dir: PathBuf,
}

impl RecordStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn records_dir(&self, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join("analysis")
            .join(date.format("%Y-%m-%d").to_string())
    }

    fn transcripts_dir(&self, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join("transcripts")
            .join(date.format("%Y-%m-%d").to_string())
    }

    /// Path a record for this date/id is (or would be) stored at.
    pub fn record_path(&self, date: NaiveDate, id: &str) -> PathBuf {
        self.records_dir(date).join(format!("{id}.json"))
    }

    /// Persist one record. Pretty-printed JSON; serde_json leaves non-ASCII
    /// unescaped, which keeps CJK summaries readable in the file.
    pub fn save(&self, date: NaiveDate, id: &str, record: &ExtractedRecord) -> Result<PathBuf> {
        let dir = self.records_dir(date);
        std::fs::create_dir_all(&dir)?;

        let path = self.record_path(date, id);
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json)?;

        info!(path = %path.display(), "Saved financial record");
        Ok(path)
    }

    /// Load one record.
    pub fn load(&self, date: NaiveDate, id: &str) -> Result<ExtractedRecord> {
        let path = self.record_path(date, id);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            FinsightError::Store(format!("cannot read record {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load every record for a date, sorted by id. Records were validated
    /// when written, so consumers may merge without re-validating.
    pub fn load_all(&self, date: NaiveDate) -> Result<Vec<(String, ExtractedRecord)>> {
        let dir = self.records_dir(date);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<ExtractedRecord>(&content) {
                Ok(record) => records.push((id.to_string(), record)),
                Err(e) => {
                    // A foreign or truncated file; skip rather than fail the
                    // whole aggregation.
                    debug!(path = %path.display(), error = %e, "Skipping unreadable record");
                }
            }
        }

        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }

    /// Dates that have at least one stored record, ascending.
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let root = self.data_dir.join("analysis");
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut dates = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(date) = NaiveDate::parse_from_str(name, "%Y-%m-%d") {
                    dates.push(date);
                }
            }
        }

        dates.sort();
        Ok(dates)
    }

    /// Persist a raw transcript for later reprocessing.
    pub fn save_transcript(
        &self,
        date: NaiveDate,
        transcript: &StoredTranscript,
    ) -> Result<PathBuf> {
        let dir = self.transcripts_dir(date);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.json", transcript.id));
        let json = serde_json::to_string_pretty(transcript)?;
        std::fs::write(&path, json)?;

        debug!(path = %path.display(), "Stored transcript");
        Ok(path)
    }

    /// Load a stored transcript.
    pub fn load_transcript(&self, date: NaiveDate, id: &str) -> Result<StoredTranscript> {
        let path = self.transcripts_dir(date).join(format!("{id}.json"));
        let content = std::fs::read_to_string(&path).map_err(|e| {
            FinsightError::Store(format!("cannot read transcript {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::rules;
    use crate::extraction::{ExtractedRecord, ExtractionMethod};

    fn sample_record(summary_suffix: &str) -> ExtractedRecord {
        let basic = rules::extract_basic(
            &format!("特斯拉 rose 5% to $300 {summary_suffix}"),
            summary_suffix,
        );
        ExtractedRecord {
            record: basic.record,
            extraction_method: ExtractionMethod::RuleBased,
            tokens_used: 0,
            attempts_used: 3,
            stocks_mentioned: basic.stocks_mentioned,
            numbers_found: basic.numbers_found,
            note: Some(basic.note),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 10).unwrap()
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        let record = sample_record("每日美股复盘");
        store.save(date(), "abc123", &record).unwrap();

        let loaded = store.load(date(), "abc123").unwrap();
        assert_eq!(loaded.extraction_method, ExtractionMethod::RuleBased);
        assert_eq!(loaded.attempts_used, 3);
        assert_eq!(loaded.record.summary, record.record.summary);
    }

    #[test]
    fn test_non_ascii_preserved_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        let record = sample_record("每日美股复盘");
        let path = store.save(date(), "abc123", &record).unwrap();

        let raw = std::fs::read_to_string(path).unwrap();
        assert!(raw.contains("每日美股复盘"));
        assert!(!raw.contains("\\u6bcf"));
    }

    #[test]
    fn test_load_all_sorted_and_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        store.save(date(), "bbb", &sample_record("b")).unwrap();
        store.save(date(), "aaa", &sample_record("a")).unwrap();
        std::fs::write(store.record_path(date(), "junk"), "not json").unwrap();

        let all = store.load_all(date()).unwrap();
        let ids: Vec<_> = all.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "bbb"]);
    }

    #[test]
    fn test_load_all_missing_date_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        assert!(store.load_all(date()).unwrap().is_empty());
    }

    #[test]
    fn test_list_dates_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        let d1 = NaiveDate::from_ymd_opt(2025, 9, 11).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 9, 9).unwrap();
        store.save(d1, "x", &sample_record("x")).unwrap();
        store.save(d2, "y", &sample_record("y")).unwrap();

        assert_eq!(store.list_dates().unwrap(), vec![d2, d1]);
    }

    #[test]
    fn test_transcript_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        let transcript = StoredTranscript {
            id: "vid1".to_string(),
            title: "Tech Update".to_string(),
            text: "NVDA rose 3%".to_string(),
            detected_language: Some("en".to_string()),
        };
        store.save_transcript(date(), &transcript).unwrap();

        let loaded = store.load_transcript(date(), "vid1").unwrap();
        assert_eq!(loaded.title, "Tech Update");
        assert_eq!(loaded.detected_language.as_deref(), Some("en"));
    }
}
