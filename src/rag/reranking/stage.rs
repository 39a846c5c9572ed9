//! Rerank stage: optional reordering with an order-preserving fallback

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{ForensicError, Result, ServiceError};
use crate::store::{ScoredChunk, SearchResult};

/// One reordered position returned by a rerank provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedIndex {
    pub index: usize,
    pub relevance_score: f32,
}

/// External relevance scorer
#[async_trait]
pub trait RerankService: Send + Sync {
    /// Indices into `documents`, most relevant first, at most `top_n`
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> std::result::Result<Vec<RankedIndex>, ServiceError>;

    fn name(&self) -> &str;
}

/// Reorders candidates by relevance; never required for correctness
#[derive(Clone, Default)]
pub struct RerankStage {
    provider: Option<Arc<dyn RerankService>>,
}

impl RerankStage {
    pub fn new(provider: Arc<dyn RerankService>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Stage without a provider: always returns the original order
    pub fn disabled() -> Self {
        Self { provider: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Reorder `candidates` and keep at most `top_n`
    ///
    /// Provider failures degrade to the original order with `reranked = false`;
    /// malformed input is an error.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Result<SearchResult> {
        if top_n == 0 {
            return Err(ForensicError::InvalidInput(
                "Rerank top_n must be at least 1".to_string(),
            ));
        }
        if query.trim().is_empty() {
            return Err(ForensicError::InvalidInput("Rerank query is empty".to_string()));
        }

        let provider = match &self.provider {
            Some(provider) if candidates.len() >= 2 => provider,
            _ => return Ok(fallback(candidates, top_n)),
        };

        let documents: Vec<String> = candidates.iter().map(|c| c.record.content.clone()).collect();
        let outcome = provider
            .rerank(query, &documents, top_n)
            .await
            .and_then(|ranked| validate(ranked, candidates.len()));

        match outcome {
            Ok(ranked) => {
                let mut slots: Vec<Option<ScoredChunk>> = candidates.into_iter().map(Some).collect();
                let hits: Vec<ScoredChunk> = ranked
                    .into_iter()
                    .take(top_n)
                    .filter_map(|r| {
                        slots[r.index].take().map(|mut hit| {
                            hit.rerank_score = Some(r.relevance_score);
                            hit
                        })
                    })
                    .collect();

                debug!(provider = provider.name(), kept = hits.len(), "Reranked candidates");
                Ok(SearchResult {
                    hits,
                    reranked: true,
                })
            }
            Err(e) => {
                let err = ForensicError::RerankUnavailable(e);
                warn!(
                    provider = provider.name(),
                    error = %err,
                    "Rerank failed, keeping vector order"
                );
                Ok(fallback(candidates, top_n))
            }
        }
    }
}

fn fallback(mut candidates: Vec<ScoredChunk>, top_n: usize) -> SearchResult {
    candidates.truncate(top_n);
    SearchResult {
        hits: candidates,
        reranked: false,
    }
}

/// Out-of-range or repeated indices mean the provider misbehaved
fn validate(
    ranked: Vec<RankedIndex>,
    len: usize,
) -> std::result::Result<Vec<RankedIndex>, ServiceError> {
    let mut seen = HashSet::with_capacity(ranked.len());
    for r in &ranked {
        if r.index >= len || !seen.insert(r.index) {
            return Err(ServiceError::SchemaMismatch(format!(
                "Rerank index {} invalid for {} candidates",
                r.index, len
            )));
        }
    }
    Ok(ranked)
}
