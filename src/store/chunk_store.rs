//! Per-category chunk store: embedding + nearest-neighbour search

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{ForensicError, Result, ServiceError};
use crate::store::{
    Category, ChunkRecord, EmbeddingService, MetadataFilter, SearchResult, VectorIndex,
};

/// Default number of texts embedded per provider call during ingestion
pub const DEFAULT_EMBED_BATCH: usize = 32;

/// Categorized retrieval store
///
/// Reads are safe to run concurrently; writes happen only during
/// operator-triggered re-ingestion.
#[derive(Clone)]
pub struct ChunkStore {
    embedder: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    embed_batch: usize,
}

impl ChunkStore {
    pub fn new(embedder: Arc<dyn EmbeddingService>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            embed_batch: DEFAULT_EMBED_BATCH,
        }
    }

    pub fn with_embed_batch(mut self, size: usize) -> Self {
        self.embed_batch = size.max(1);
        self
    }

    /// Add one record
    pub async fn add(&self, category: Category, record: ChunkRecord) -> Result<()> {
        self.add_batch(category, vec![record]).await
    }

    /// Add records to a category; ids must be unique within the batch
    pub async fn add_batch(&self, category: Category, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            record.validate()?;
            if record.category != category {
                return Err(ForensicError::InvalidInput(format!(
                    "Chunk {} belongs to {}, not {}",
                    record.id, record.category, category
                )));
            }
            if !seen.insert(record.id.as_str()) {
                return Err(ForensicError::InvalidInput(format!(
                    "Duplicate chunk id {} in batch for {}",
                    record.id, category
                )));
            }
        }

        let unavailable = |source: ServiceError| ForensicError::RetrievalUnavailable { category, source };

        self.index
            .ensure_collection(category, self.embedder.dimension())
            .await
            .map_err(unavailable)?;

        let total = records.len();
        let mut pending = records.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<ChunkRecord> = pending.by_ref().take(self.embed_batch).collect();
            let texts: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();

            let vectors = self.embedder.embed_batch(&texts).await.map_err(unavailable)?;
            if vectors.len() != batch.len() {
                return Err(unavailable(ServiceError::SchemaMismatch(format!(
                    "Embedded {} of {} texts",
                    vectors.len(),
                    batch.len()
                ))));
            }

            let points = batch.into_iter().zip(vectors).collect();
            self.index.upsert(category, points).await.map_err(unavailable)?;
        }

        info!(category = %category, count = total, "Stored chunks");
        Ok(())
    }

    /// Up to `k` records nearest to `query_text`, ascending distance
    pub async fn query(
        &self,
        category: Category,
        query_text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<SearchResult> {
        if query_text.trim().is_empty() {
            return Err(ForensicError::InvalidInput("Query text is empty".to_string()));
        }
        if k == 0 {
            return Ok(SearchResult::empty());
        }

        let unavailable = |source: ServiceError| ForensicError::RetrievalUnavailable { category, source };

        let vector = self.embedder.embed(query_text).await.map_err(unavailable)?;
        let no_filter = MetadataFilter::new();
        let hits = self
            .index
            .search(category, &vector, k, filter.unwrap_or(&no_filter))
            .await
            .map_err(unavailable)?;

        debug!(category = %category, k, hits = hits.len(), "Queried category");
        Ok(SearchResult::new(hits))
    }

    /// Drop every record of a category
    pub async fn clear(&self, category: Category) -> Result<()> {
        self.index
            .clear(category)
            .await
            .map_err(|source| ForensicError::RetrievalUnavailable { category, source })?;
        info!(category = %category, "Cleared category");
        Ok(())
    }

    pub async fn count(&self, category: Category) -> Result<u64> {
        self.index
            .count(category)
            .await
            .map_err(|source| ForensicError::RetrievalUnavailable { category, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryIndex;
    use async_trait::async_trait;

    /// Letter-frequency embedder, deterministic and offline
    struct LetterEmbedder;

    #[async_trait]
    impl EmbeddingService for LetterEmbedder {
        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ServiceError> {
            let mut v = vec![0.0f32; 26];
            for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
            Ok(v)
        }

        fn dimension(&self) -> usize {
            26
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingService for DownEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, ServiceError> {
            Err(ServiceError::ProviderUnavailable("connection refused".to_string()))
        }

        fn dimension(&self) -> usize {
            26
        }
    }

    fn store() -> ChunkStore {
        ChunkStore::new(Arc::new(LetterEmbedder), Arc::new(MemoryIndex::new()))
    }

    fn record(content: &str) -> ChunkRecord {
        ChunkRecord::new(Category::PortfolioFacts, "facts.pdf", content)
    }

    #[tokio::test]
    async fn test_empty_category_returns_empty() {
        for category in Category::ALL {
            let result = store().query(category, "fees", 5, None).await.unwrap();
            assert!(result.is_empty());
        }
    }

    #[tokio::test]
    async fn test_query_bounded_and_ordered() {
        let store = store();
        store
            .add_batch(
                Category::PortfolioFacts,
                vec![record("zzz"), record("fees fees"), record("fee schedule"), record("xyz")],
            )
            .await
            .unwrap();

        let result = store.query(Category::PortfolioFacts, "fees", 2, None).await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.hits[0].distance <= result.hits[1].distance);
        assert_eq!(result.hits[0].record.content, "fees fees");
    }

    #[tokio::test]
    async fn test_filter_restricts_results() {
        let store = store();
        store
            .add_batch(
                Category::PortfolioFacts,
                vec![
                    record("fees 2007").with_extra("year", 2007i64),
                    record("fees 2008").with_extra("year", 2008i64),
                ],
            )
            .await
            .unwrap();

        let filter = MetadataFilter::new().eq("year", 2008i64);
        let result = store
            .query(Category::PortfolioFacts, "fees", 5, Some(&filter))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.hits[0].record.content, "fees 2008");
    }

    #[tokio::test]
    async fn test_clear_empties_category() {
        let store = store();
        store.add(Category::PortfolioFacts, record("fees")).await.unwrap();
        assert_eq!(store.count(Category::PortfolioFacts).await.unwrap(), 1);

        store.clear(Category::PortfolioFacts).await.unwrap();
        let result = store.query(Category::PortfolioFacts, "fees", 5, None).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_retrieval_unavailable() {
        let store = ChunkStore::new(Arc::new(DownEmbedder), Arc::new(MemoryIndex::new()));
        let err = store
            .query(Category::CompleteAnalysis, "fees", 5, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForensicError::RetrievalUnavailable {
                category: Category::CompleteAnalysis,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_wrong_category_and_duplicates_rejected() {
        let store = store();
        let other = ChunkRecord::new(Category::OfficialDocs, "policy.pdf", "rules");
        assert!(store.add(Category::PortfolioFacts, other).await.is_err());

        let dup = record("same");
        assert!(store
            .add_batch(Category::PortfolioFacts, vec![dup.clone(), dup])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_zero_k_and_blank_query() {
        let store = store();
        store.add(Category::PortfolioFacts, record("fees")).await.unwrap();
        assert!(store
            .query(Category::PortfolioFacts, "fees", 0, None)
            .await
            .unwrap()
            .is_empty());
        assert!(store.query(Category::PortfolioFacts, "  ", 3, None).await.is_err());
    }
}
