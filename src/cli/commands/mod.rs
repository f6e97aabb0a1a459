//! CLI command implementations.

mod aggregate;
mod analyze;
mod batch;
mod config;
mod doctor;
mod extract;

pub use aggregate::run_aggregate;
pub use analyze::run_analyze;
pub use batch::run_batch;
pub use config::run_config;
pub use doctor::run_doctor;
pub use extract::{run_extract, run_reprocess};
