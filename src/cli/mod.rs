//! CLI module for ForensicBuddy
//!
//! Handles command-line argument parsing and JSONL ingestion input.

pub mod args;
pub mod ingest;

pub use args::{Args, Commands, Verbosity};
pub use ingest::{parse_records, replace_category};
