//! Reranking: stage with fallback semantics plus concrete providers

pub mod cohere;
pub mod lexical;
pub mod stage;

pub use cohere::CohereReranker;
pub use lexical::{LexicalConfig, LexicalReranker};
pub use stage::{RankedIndex, RerankService, RerankStage};
