//! Retrieval-augmented context for the answering core
//!
//! Components:
//! - Reranking: optional reordering with an order-preserving fallback
//! - Retrieval: the primary / secondary / tertiary category cascade
//! - Context: prompt rendering and citation extraction

pub mod context;
pub mod reranking;
pub mod retrieval;

pub use context::{ContextBuilder, ContextConfig, SourceRef};
pub use reranking::{RerankService, RerankStage};
pub use retrieval::{CascadeTuning, HierarchicalRetriever, RetrievalMap, RetrievalPolicy};
