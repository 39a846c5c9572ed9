//! ForensicBuddy v0.1.0 - Forensic case assistant
//!
//! Answers questions about a forensic investment case from a categorised
//! document corpus.
//!
//! # Architecture
//!
//! - **store**: per-category chunk collections over a vector index
//! - **rag**: hierarchical primary/secondary/tertiary retrieval with reranking
//! - **agent**: routing, specialist fan-out and consolidation
//! - **llm**: structured-output completion client

pub mod errors;
pub mod store;
pub mod llm;
pub mod rag;
pub mod agent;

// Re-export commonly used types
pub use errors::{ForensicError, Result, ServiceError};
pub use agent::{Answer, CaseAssistant, ChatTurn};

// Wiring and command-line surface
pub mod bootstrap;
pub mod cli;
pub mod config;
