//! Vector index backends, one collection per category

pub mod memory;
pub mod qdrant;

pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::store::{Category, ChunkRecord, MetadataFilter, ScoredChunk};

/// Nearest-neighbour storage for embedded chunk records
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the category's collection if it does not exist yet
    async fn ensure_collection(&self, category: Category, dimension: usize)
        -> Result<(), ServiceError>;

    /// Insert or replace records by id
    async fn upsert(
        &self,
        category: Category,
        points: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<(), ServiceError>;

    /// Up to `limit` records ordered by ascending distance; a missing or
    /// empty collection yields an empty list
    async fn search(
        &self,
        category: Category,
        vector: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>, ServiceError>;

    /// Remove every record of the category
    async fn clear(&self, category: Category) -> Result<(), ServiceError>;

    /// Number of stored records
    async fn count(&self, category: Category) -> Result<u64, ServiceError>;
}

/// Cosine distance (1 - cosine similarity); degenerate vectors are maximally far
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 1.0;
    }
    (1.0 - dot / denom) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance_bounds() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_degenerate() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[], &[]), 1.0);
    }
}
