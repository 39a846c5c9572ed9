//! Renders retrieval maps into prompt text and citation lists
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::rag::retrieval::RetrievalMap;
use crate::store::{Category, RelevanceTier};

const RULE_WIDTH: usize = 70;

/// Marker appended to complementary documents cut at the char cap
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Returned when no category produced a document
pub const NO_DOCUMENTS: &str = "No relevant documents found.";

/// Context rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Complementary documents rendered per category
    pub complementary_docs_per_category: usize,
    /// Character cap for each complementary document
    pub complementary_char_cap: usize,
    /// Maximum number of citations
    pub source_cap: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            complementary_docs_per_category: 3,
            complementary_char_cap: 1000,
            source_cap: 10,
        }
    }
}

/// User-facing citation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub filename: String,
    pub page: Option<u32>,
    pub category: Category,
    pub relevance_tier: RelevanceTier,
}

/// Context builder for completion prompts
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Primary results first and delimited as authoritative, then the other
    /// non-empty categories as capped complementary material
    pub fn format(&self, map: &RetrievalMap) -> String {
        let mut out = String::new();
        let rule = "=".repeat(RULE_WIDTH);

        let primary = map.primary();
        if let Some((_, results)) = primary.filter(|(_, r)| !r.is_empty()) {
            out.push('\n');
            out.push_str(&rule);
            out.push_str("\n>>> PRIMARY SOURCE - AUTHORITATIVE CASE ANALYSIS <<<\n");
            out.push_str(&rule);
            out.push_str("\n\n");

            for record in results.records() {
                out.push_str(&format!("[{}]\n{}\n\n---\n\n", record.source_document, record.content));
            }

            out.push_str(&rule);
            out.push_str("\n>>> END OF PRIMARY SOURCE <<<\n");
            out.push_str(&rule);
            out.push_str("\n\n");
        }

        let primary_category = primary.map(|(c, _)| c);
        let mut has_complementary = false;
        for (category, results) in map.iter() {
            if Some(category) == primary_category || results.is_empty() {
                continue;
            }
            if !has_complementary {
                out.push_str("\n--- COMPLEMENTARY DATA (use only when needed) ---\n\n");
                has_complementary = true;
            }

            out.push_str(&format!("[{}]\n", category.label()));
            for record in results
                .records()
                .take(self.config.complementary_docs_per_category)
            {
                out.push_str(&format!(
                    "({}) {}\n\n",
                    record.source_document,
                    truncate_chars(&record.content, self.config.complementary_char_cap)
                ));
            }
        }

        if out.is_empty() {
            NO_DOCUMENTS.to_string()
        } else {
            out
        }
    }

    /// Per-category blocks with no primary emphasis; used by specialists
    /// that only need a subset of categories
    pub fn render_categories(&self, map: &RetrievalMap, categories: &[Category]) -> String {
        let mut out = String::new();
        for &category in categories {
            let Some(results) = map.get(category).filter(|r| !r.is_empty()) else {
                continue;
            };
            out.push_str(&format!("[{}]\n", category.label()));
            for record in results.records() {
                out.push_str(&format!("({}) {}\n\n", record.source_document, record.content));
            }
        }
        out
    }

    /// Deduplicated citations in first-seen order, capped
    pub fn extract_sources(&self, map: &RetrievalMap) -> Vec<SourceRef> {
        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for (category, results) in map.iter() {
            for record in results.records() {
                if sources.len() >= self.config.source_cap {
                    return sources;
                }
                if record.source_document.is_empty() || !seen.insert(record.source_document.as_str()) {
                    continue;
                }
                sources.push(SourceRef {
                    filename: record.source_document.clone(),
                    page: record.source_page,
                    category,
                    relevance_tier: record.relevance_tier,
                });
            }
        }
        sources
    }
}

/// Cut `text` to `cap` characters, appending the truncation marker when cut
pub fn truncate_chars(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
