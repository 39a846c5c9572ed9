//! Shared offline fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forensicbuddy::llm::{CompletionRequest, CompletionService};
use forensicbuddy::rag::reranking::RankedIndex;
use forensicbuddy::rag::RerankService;
use forensicbuddy::store::{
    Category, ChunkRecord, ChunkStore, EmbeddingService, MemoryIndex, MetadataFilter, ScoredChunk,
    VectorIndex,
};
use forensicbuddy::ServiceError;

pub const DIMENSION: usize = 64;

/// Hashed bag-of-words embedder; shared words mean smaller distance
pub struct WordHashEmbedder;

#[async_trait]
impl EmbeddingService for WordHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut vector = vec![0.0f32; DIMENSION];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % DIMENSION as u64) as usize] += 1.0;
        }
        // Keep every vector non-degenerate
        vector[0] += 0.01;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Embedder whose provider is down
pub struct DownEmbedder;

#[async_trait]
impl EmbeddingService for DownEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        Err(ServiceError::ProviderUnavailable("connection refused".to_string()))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Index that accepts writes but fails every search of one category
pub struct FlakyIndex {
    inner: MemoryIndex,
    broken: Category,
}

impl FlakyIndex {
    pub fn new(broken: Category) -> Self {
        Self {
            inner: MemoryIndex::new(),
            broken,
        }
    }
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn ensure_collection(&self, category: Category, dimension: usize) -> Result<(), ServiceError> {
        self.inner.ensure_collection(category, dimension).await
    }

    async fn upsert(
        &self,
        category: Category,
        points: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<(), ServiceError> {
        self.inner.upsert(category, points).await
    }

    async fn search(
        &self,
        category: Category,
        vector: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>, ServiceError> {
        if category == self.broken {
            return Err(ServiceError::ProviderUnavailable("collection offline".to_string()));
        }
        self.inner.search(category, vector, limit, filter).await
    }

    async fn clear(&self, category: Category) -> Result<(), ServiceError> {
        self.inner.clear(category).await
    }

    async fn count(&self, category: Category) -> Result<u64, ServiceError> {
        self.inner.count(category).await
    }
}

/// Index that records the `limit` of every search
#[derive(Default)]
pub struct RecordingIndex {
    inner: MemoryIndex,
    pub searches: Mutex<Vec<(Category, usize)>>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limits_for(&self, category: Category) -> Vec<usize> {
        self.searches
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, limit)| *limit)
            .collect()
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn ensure_collection(&self, category: Category, dimension: usize) -> Result<(), ServiceError> {
        self.inner.ensure_collection(category, dimension).await
    }

    async fn upsert(
        &self,
        category: Category,
        points: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<(), ServiceError> {
        self.inner.upsert(category, points).await
    }

    async fn search(
        &self,
        category: Category,
        vector: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>, ServiceError> {
        self.searches.lock().unwrap().push((category, limit));
        self.inner.search(category, vector, limit, filter).await
    }

    async fn clear(&self, category: Category) -> Result<(), ServiceError> {
        self.inner.clear(category).await
    }

    async fn count(&self, category: Category) -> Result<u64, ServiceError> {
        self.inner.count(category).await
    }
}

/// Reranker that always errors
pub struct DownReranker;

#[async_trait]
impl RerankService for DownReranker {
    async fn rerank(
        &self,
        _query: &str,
        _documents: &[String],
        _top_n: usize,
    ) -> Result<Vec<RankedIndex>, ServiceError> {
        Err(ServiceError::Timeout { duration_ms: 15000 })
    }

    fn name(&self) -> &str {
        "down"
    }
}

pub fn memory_store() -> ChunkStore {
    ChunkStore::new(Arc::new(WordHashEmbedder), Arc::new(MemoryIndex::new()))
}

/// `count` records in `category`, one source document each
pub async fn seed(store: &ChunkStore, category: Category, prefix: &str, count: usize) {
    let records = (0..count)
        .map(|i| {
            ChunkRecord::new(
                category,
                format!("{}_{}.pdf", prefix, i),
                format!("{} fund allocation note number {}", prefix, i),
            )
        })
        .collect();
    store.add_batch(category, records).await.unwrap();
}

/// Completion double answering by output schema name
///
/// Unscripted schemas fail with `ProviderUnavailable`; a delay applies to
/// every call.
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: HashMap<String, Result<Value, ServiceError>>,
    delay: Option<Duration>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, schema: &str, value: Value) -> Self {
        self.responses.insert(schema.to_string(), Ok(value));
        self
    }

    pub fn failing(mut self, schema: &str, error: ServiceError) -> Self {
        self.responses.insert(schema.to_string(), Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls_for(&self, schema: &str) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.schema.name == schema)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .get(&request.schema.name)
            .cloned()
            .unwrap_or_else(|| {
                Err(ServiceError::ProviderUnavailable(format!(
                    "no script for {}",
                    request.schema.name
                )))
            })
    }
}
