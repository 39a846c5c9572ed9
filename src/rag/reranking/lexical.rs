//! Offline reranker: vector rank prior blended with keyword overlap

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::stage::{RankedIndex, RerankService};
use crate::errors::ServiceError;

/// Lexical reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    /// Weight of keyword overlap (0.0 to 1.0); the rest goes to the vector rank
    pub keyword_weight: f32,
    /// Shorter query terms are ignored
    pub min_term_len: usize,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 0.4,
            min_term_len: 4,
        }
    }
}

/// Keyword-overlap reranker; no network
#[derive(Debug, Clone, Default)]
pub struct LexicalReranker {
    config: LexicalConfig,
}

impl LexicalReranker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LexicalConfig) -> Self {
        Self { config }
    }

    fn terms(&self, text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= self.config.min_term_len)
            .map(str::to_string)
            .collect()
    }

    /// Share of query terms present in the document
    fn keyword_score(&self, query_terms: &HashSet<String>, document: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let doc_terms = self.terms(document);
        let hits = query_terms.iter().filter(|t| doc_terms.contains(*t)).count();
        hits as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl RerankService for LexicalReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RankedIndex>, ServiceError> {
        let query_terms = self.terms(query);
        let n = documents.len().max(1) as f32;
        let weight = self.config.keyword_weight.clamp(0.0, 1.0);

        let mut ranked: Vec<RankedIndex> = documents
            .iter()
            .enumerate()
            .map(|(index, document)| {
                let prior = 1.0 - index as f32 / n;
                let keyword = self.keyword_score(&query_terms, document);
                RankedIndex {
                    index,
                    relevance_score: (1.0 - weight) * prior + weight * keyword,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.index.cmp(&b.index))
        });
        ranked.truncate(top_n);
        Ok(ranked)
    }

    fn name(&self) -> &str {
        "lexical"
    }
}
