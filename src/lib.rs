// Domain types
pub mod core;

// Rule table and run settings
pub mod config;

// Dataset loading
pub mod ingest;

// Feature aggregation, scoring, ranking, reporting
pub mod analytics;

// CSV output
pub mod export;

// End-to-end batch run
pub mod pipeline;

pub use crate::core::*;
pub use pipeline::{run, RunOptions, RunSummary};
