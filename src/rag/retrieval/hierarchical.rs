//! Priority cascade across evidence categories
//!
//! Primary is always searched first and always present in the result map.
//! Its yield decides the secondary budget; tertiary categories are only
//! searched when routing asks for them. Tiers run in sequence, categories
//! within a tier run concurrently.

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{ForensicError, Result};
use crate::rag::reranking::RerankStage;
use crate::store::{Category, CategoryRegistry, ChunkStore, SearchResult};

/// Per-query retrieval budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalPolicy {
    pub n_primary: usize,
    pub n_secondary: usize,
    pub include_tertiary: bool,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            n_primary: 10,
            n_secondary: 5,
            include_tertiary: false,
        }
    }
}

impl RetrievalPolicy {
    pub fn with_tertiary(mut self, include: bool) -> Self {
        self.include_tertiary = include;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_primary == 0 || self.n_secondary == 0 {
            return Err(ForensicError::InvalidInput(format!(
                "Retrieval budgets must be positive (primary {}, secondary {})",
                self.n_primary, self.n_secondary
            )));
        }
        Ok(())
    }
}

/// Heuristic constants of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeTuning {
    /// Candidates fetched per kept result before reranking
    pub overfetch_factor: usize,
    /// Primary results needed to count as "primary has context"
    pub primary_context_threshold: usize,
    /// Secondary budget divisor applied when primary has context
    pub secondary_divisor: usize,
    /// Fixed result count per tertiary category
    pub tertiary_count: usize,
}

impl Default for CascadeTuning {
    fn default() -> Self {
        Self {
            overfetch_factor: 2,
            primary_context_threshold: 2,
            secondary_divisor: 2,
            tertiary_count: 2,
        }
    }
}

impl CascadeTuning {
    pub fn primary_has_context(&self, primary_hits: usize) -> bool {
        primary_hits >= self.primary_context_threshold
    }

    /// Results kept per secondary category
    pub fn secondary_budget(&self, n_secondary: usize, primary_has_context: bool) -> usize {
        if primary_has_context {
            (n_secondary / self.secondary_divisor.max(1)).max(1)
        } else {
            n_secondary
        }
    }

    pub fn overfetch(&self, keep: usize) -> usize {
        keep.saturating_mul(self.overfetch_factor.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.overfetch_factor == 0 || self.secondary_divisor == 0 {
            return Err(ForensicError::ConfigError(
                "overfetch_factor and secondary_divisor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Category -> results, in cascade order; the primary key is always present
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetrievalMap {
    entries: Vec<(Category, SearchResult)>,
    primary_has_context: bool,
}

impl RetrievalMap {
    pub fn new(primary: Category, primary_results: SearchResult, primary_has_context: bool) -> Self {
        Self {
            entries: vec![(primary, primary_results)],
            primary_has_context,
        }
    }

    pub fn insert(&mut self, category: Category, results: SearchResult) {
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some(slot) => slot.1 = results,
            None => self.entries.push((category, results)),
        }
    }

    pub fn get(&self, category: Category) -> Option<&SearchResult> {
        self.entries.iter().find(|(c, _)| *c == category).map(|(_, r)| r)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.get(category).is_some()
    }

    /// Primary category and its results
    pub fn primary(&self) -> Option<(Category, &SearchResult)> {
        self.entries.first().map(|(c, r)| (*c, r))
    }

    pub fn primary_has_context(&self) -> bool {
        self.primary_has_context
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &SearchResult)> {
        self.entries.iter().map(|(c, r)| (*c, r))
    }

    pub fn categories(&self) -> Vec<Category> {
        self.entries.iter().map(|(c, _)| *c).collect()
    }

    pub fn total_hits(&self) -> usize {
        self.entries.iter().map(|(_, r)| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_hits() == 0
    }
}

/// Executes the priority cascade
#[derive(Clone)]
pub struct HierarchicalRetriever {
    store: ChunkStore,
    reranker: RerankStage,
    registry: CategoryRegistry,
    tuning: CascadeTuning,
}

impl HierarchicalRetriever {
    pub fn new(store: ChunkStore, reranker: RerankStage, registry: CategoryRegistry) -> Self {
        Self {
            store,
            reranker,
            registry,
            tuning: CascadeTuning::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: CascadeTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn tuning(&self) -> &CascadeTuning {
        &self.tuning
    }

    /// Run the cascade; any category failure aborts the whole retrieval
    pub async fn retrieve(&self, query: &str, policy: &RetrievalPolicy) -> Result<RetrievalMap> {
        policy.validate()?;

        let primary = self.registry.primary();
        let primary_results = self.search_reranked(query, primary, policy.n_primary).await?;
        let has_context = self.tuning.primary_has_context(primary_results.len());
        debug!(
            category = %primary,
            hits = primary_results.len(),
            has_context,
            "Primary tier searched"
        );

        let mut map = RetrievalMap::new(primary, primary_results, has_context);

        let budget = self.tuning.secondary_budget(policy.n_secondary, has_context);
        let secondary = try_join_all(
            self.registry
                .secondary()
                .iter()
                .map(|&category| async move {
                    self.search_reranked(query, category, budget)
                        .await
                        .map(|results| (category, results))
                }),
        )
        .await?;
        for (category, results) in secondary {
            map.insert(category, results);
        }

        if policy.include_tertiary {
            let count = self.tuning.tertiary_count;
            let tertiary = try_join_all(self.registry.tertiary().iter().map(|&category| async move {
                self.store
                    .query(category, query, count, None)
                    .await
                    .map(|results| (category, results))
            }))
            .await?;
            for (category, results) in tertiary {
                map.insert(category, results);
            }
        }

        info!(
            categories = map.categories().len(),
            total_hits = map.total_hits(),
            secondary_budget = budget,
            include_tertiary = policy.include_tertiary,
            "Retrieval complete"
        );
        Ok(map)
    }

    /// Overfetch, then rerank down to `keep`
    async fn search_reranked(
        &self,
        query: &str,
        category: Category,
        keep: usize,
    ) -> Result<SearchResult> {
        let candidates = self
            .store
            .query(category, query, self.tuning.overfetch(keep), None)
            .await?;
        self.reranker.rerank(query, candidates.hits, keep).await
    }
}
