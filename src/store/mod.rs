//! Categorized retrieval store
//!
//! Components:
//! - Category taxonomy and its priority tiers
//! - Chunk records with typed and residual metadata
//! - Embedding providers (HTTP and on-device)
//! - Vector index backends (Qdrant and in-memory)
//! - ChunkStore: per-category add / query / clear

pub mod category;
pub mod chunk_store;
pub mod embedding;
pub mod index;
pub mod types;

pub use category::{Category, CategoryRegistry, Tier};
pub use chunk_store::ChunkStore;
pub use embedding::{EmbeddingService, HttpEmbeddingClient, LocalEmbeddingService};
pub use index::{cosine_distance, MemoryIndex, QdrantIndex, VectorIndex};
pub use types::{
    ChunkMetadata, ChunkRecord, MetadataFilter, MetadataValue, RelevanceTier, ScoredChunk,
    SearchResult,
};
