//! In-process brute-force cosine index

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{cosine_distance, VectorIndex};
use crate::errors::ServiceError;
use crate::store::{Category, ChunkRecord, MetadataFilter, ScoredChunk};

#[derive(Debug, Default)]
struct Collection {
    dimension: Option<usize>,
    points: Vec<(ChunkRecord, Vec<f32>)>,
}

/// Vector index held in memory; used for tests and small corpora
#[derive(Debug, Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<Category, Collection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(
        &self,
        category: Category,
        dimension: usize,
    ) -> Result<(), ServiceError> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(category).or_default();
        match collection.dimension {
            Some(existing) if existing != dimension => Err(ServiceError::SchemaMismatch(format!(
                "Collection {} has dimension {}, requested {}",
                category, existing, dimension
            ))),
            _ => {
                collection.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    async fn upsert(
        &self,
        category: Category,
        points: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<(), ServiceError> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(category).or_default();

        for (record, vector) in points {
            if let Some(dim) = collection.dimension {
                if vector.len() != dim {
                    return Err(ServiceError::SchemaMismatch(format!(
                        "Vector for {} has dimension {}, collection expects {}",
                        record.id,
                        vector.len(),
                        dim
                    )));
                }
            } else {
                collection.dimension = Some(vector.len());
            }

            match collection.points.iter_mut().find(|(r, _)| r.id == record.id) {
                Some(slot) => *slot = (record, vector),
                None => collection.points.push((record, vector)),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        category: Category,
        vector: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>, ServiceError> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&category) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<ScoredChunk> = collection
            .points
            .iter()
            .filter(|(record, _)| filter.matches(record))
            .map(|(record, stored)| ScoredChunk::new(record.clone(), cosine_distance(vector, stored)))
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn clear(&self, category: Category) -> Result<(), ServiceError> {
        self.collections.write().await.remove(&category);
        Ok(())
    }

    async fn count(&self, category: Category) -> Result<u64, ServiceError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&category)
            .map(|c| c.points.len() as u64)
            .unwrap_or(0))
    }
}
