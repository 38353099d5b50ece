//! Pipeline entry points for CLI operations.
//!
//! - `run_replay`: Feed recorded page loads through the tracker
//! - `run_report`: Print the dashboard state
//! - `run_export`: Write all stored data as JSON

pub mod export;
pub mod replay;
pub mod report;

pub use export::run_export;
pub use replay::{ReplaySummary, run_replay};
pub use report::run_report;
