//! Structured financial extraction.
//!
//! Turns free-form transcript text into a validated [`schema::FinancialRecord`]:
//! the [`extractor`] drives the LLM gateway and [`parser`] with retries and
//! falls back to the deterministic [`rules`] extractor when the LLM path is
//! unavailable or exhausted.

mod extractor;
pub mod parser;
pub mod rules;
mod schema;

pub use extractor::{CancelFlag, ExtractorOptions, FinancialExtractor};
pub use parser::{ParseError, ParseFailure};
pub use schema::{
    generation_schema, AdviceEntry, EventCategory, EventEntry, ExtractedRecord, ExtractionMethod,
    ExtractionRequest, FinancialRecord, IndexEntry, MacroEntry, MarketOverview, PriceLevels,
    Recommendation, RiskEntry, RiskLevel, StockEntry, Timeframe,
};
