//! CLI output formatting utilities.

use crate::extraction::ExtractedRecord;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Print the interesting parts of an extracted record.
    pub fn record_summary(record: &ExtractedRecord) {
        Self::header("Extraction result");
        Self::kv("method", &record.extraction_method.to_string());
        Self::kv("attempts", &record.attempts_used.to_string());
        if record.tokens_used > 0 {
            Self::kv("tokens", &record.tokens_used.to_string());
        }

        if !record.record.summary.is_empty() {
            Self::kv("summary", &record.record.summary);
        }

        if !record.record.market_overview.major_indices.is_empty() {
            Self::header("Major indices");
            for index in record.record.market_overview.major_indices.iter().take(3) {
                Self::list_item(&format!("{}: {}", index.name, index.performance));
            }
        }

        if !record.record.stock_analysis.is_empty() {
            Self::header(&format!("Stocks ({})", record.record.stock_analysis.len()));
            for stock in &record.record.stock_analysis {
                let name = stock
                    .company_name
                    .as_deref()
                    .map(|n| format!("{} ({})", stock.symbol, n))
                    .unwrap_or_else(|| stock.symbol.clone());
                Self::list_item(&name);
                for point in stock.key_points.iter().take(2) {
                    println!("      {}", style(point).dim());
                }
            }
        }

        if !record.record.risks_and_warnings.is_empty() {
            Self::header("Risks");
            for risk in record.record.risks_and_warnings.iter().take(3) {
                Self::list_item(&risk.risk);
            }
        }

        if !record.stocks_mentioned.is_empty() {
            Self::kv("stocks mentioned", &record.stocks_mentioned.join(", "));
        }
        if !record.numbers_found.is_empty() {
            Self::kv("numbers found", &record.numbers_found.join(", "));
        }
        if let Some(note) = &record.note {
            Self::warning(note);
        }
    }
}
