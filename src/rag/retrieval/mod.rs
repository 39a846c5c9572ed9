//! Hierarchical multi-category retrieval
pub mod hierarchical;

pub use hierarchical::{CascadeTuning, HierarchicalRetriever, RetrievalMap, RetrievalPolicy};
