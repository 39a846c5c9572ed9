//! Chunk records, metadata, filters and search results

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::errors::{ForensicError, Result};
use crate::store::Category;

/// Namespace for content-addressed chunk ids
const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f7a_1c3e_52d4_4b8e_9a0f_3e21_c4d7_b815);

/// Payload keys owned by the record itself; residual metadata may not reuse them
pub const RESERVED_KEYS: [&str; 8] = [
    "chunk_id",
    "content",
    "category",
    "source_document",
    "source_page",
    "relevance_tier",
    "event_date",
    "portfolio",
];

/// Relevance tier assigned at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceTier {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl RelevanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Flattened scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Integer(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Optional typed fields plus a residual map for category-specific extensions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, MetadataValue>,
}

/// Immutable unit of evidence owned by the chunk store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub category: Category,
    pub content: String,
    pub source_document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
    #[serde(default)]
    pub relevance_tier: RelevanceTier,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    /// Create a record whose id is derived from its content
    pub fn new(
        category: Category,
        source_document: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let source_document = source_document.into();
        let content = content.into();
        let id = Self::content_id(category, &source_document, &content);

        Self {
            id,
            category,
            content,
            source_document,
            source_page: None,
            relevance_tier: RelevanceTier::default(),
            metadata: ChunkMetadata::default(),
        }
    }

    /// Stable content-addressed identifier
    pub fn content_id(category: Category, source_document: &str, content: &str) -> String {
        let key = format!("{}\u{1f}{}\u{1f}{}", category.as_str(), source_document, content);
        Uuid::new_v5(&CHUNK_ID_NAMESPACE, key.as_bytes()).to_string()
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.source_page = Some(page);
        self
    }

    pub fn with_relevance(mut self, tier: RelevanceTier) -> Self {
        self.relevance_tier = tier;
        self
    }

    pub fn with_event_date(mut self, date: NaiveDate) -> Self {
        self.metadata.event_date = Some(date);
        self
    }

    pub fn with_portfolio(mut self, portfolio: impl Into<String>) -> Self {
        self.metadata.portfolio = Some(portfolio.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.extra.insert(key.into(), value.into());
        self
    }

    /// Reject records the store cannot hold faithfully
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ForensicError::InvalidInput("Chunk id must not be empty".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(ForensicError::InvalidInput(format!(
                "Chunk {} has empty content",
                self.id
            )));
        }
        if let Some(key) = self
            .metadata
            .extra
            .keys()
            .find(|k| RESERVED_KEYS.contains(&k.as_str()))
        {
            return Err(ForensicError::InvalidInput(format!(
                "Chunk {} uses reserved metadata key '{}'",
                self.id, key
            )));
        }
        Ok(())
    }

    /// Value of a metadata field, typed or residual
    pub fn field(&self, key: &str) -> Option<MetadataValue> {
        match key {
            "chunk_id" => Some(MetadataValue::Text(self.id.clone())),
            "category" => Some(MetadataValue::Text(self.category.as_str().to_string())),
            "source_document" => Some(MetadataValue::Text(self.source_document.clone())),
            "source_page" => self.source_page.map(|p| MetadataValue::Integer(i64::from(p))),
            "relevance_tier" => Some(MetadataValue::Text(self.relevance_tier.as_str().to_string())),
            "event_date" => self
                .metadata
                .event_date
                .map(|d| MetadataValue::Text(d.format("%Y-%m-%d").to_string())),
            "portfolio" => self.metadata.portfolio.clone().map(MetadataValue::Text),
            other => self.metadata.extra.get(other).cloned(),
        }
    }

    /// Flatten into a scalar payload (content included)
    pub fn to_payload(&self) -> BTreeMap<String, MetadataValue> {
        let mut payload = self.metadata.extra.clone();
        for key in RESERVED_KEYS {
            let value = if key == "content" {
                Some(MetadataValue::Text(self.content.clone()))
            } else {
                self.field(key)
            };
            if let Some(value) = value {
                payload.insert(key.to_string(), value);
            }
        }
        payload
    }

    /// Rebuild a record from a flattened payload
    pub fn from_payload(mut payload: BTreeMap<String, MetadataValue>) -> Result<Self> {
        let mut take_text = |key: &str| -> Option<String> {
            match payload.remove(key) {
                Some(MetadataValue::Text(s)) => Some(s),
                Some(other) => Some(other.to_string()),
                None => None,
            }
        };

        let id = take_text("chunk_id")
            .ok_or_else(|| ForensicError::InvalidInput("Payload missing chunk_id".to_string()))?;
        let category: Category = take_text("category")
            .ok_or_else(|| ForensicError::InvalidInput(format!("Payload {} missing category", id)))?
            .parse()?;
        let content = take_text("content").unwrap_or_default();
        let source_document = take_text("source_document").unwrap_or_default();
        let relevance_tier = take_text("relevance_tier")
            .and_then(|t| RelevanceTier::parse(&t))
            .unwrap_or_default();
        let event_date = take_text("event_date")
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());
        let portfolio = take_text("portfolio");
        let source_page = match payload.remove("source_page") {
            Some(MetadataValue::Integer(p)) => u32::try_from(p).ok(),
            Some(MetadataValue::Text(p)) => p.parse().ok(),
            _ => None,
        };

        Ok(Self {
            id,
            category,
            content,
            source_document,
            source_page,
            relevance_tier,
            metadata: ChunkMetadata {
                event_date,
                portfolio,
                extra: payload,
            },
        })
    }
}

/// Conjunction of exact-match conditions over metadata fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataFilter {
    conditions: Vec<(String, MetadataValue)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-match condition
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, MetadataValue)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True when every condition holds for the record
    pub fn matches(&self, record: &ChunkRecord) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| record.field(field).as_ref() == Some(expected))
    }
}

/// A record with its vector distance (ascending = closer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub distance: f32,
    /// Relevance assigned by the rerank provider, when reranked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl ScoredChunk {
    pub fn new(record: ChunkRecord, distance: f32) -> Self {
        Self {
            record,
            distance,
            rerank_score: None,
        }
    }
}

/// Ordered, bounded search hits for one category; empty is valid
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub hits: Vec<ScoredChunk>,
    /// Whether a rerank provider reordered these hits
    #[serde(default)]
    pub reranked: bool,
}

impl SearchResult {
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self {
            hits,
            reranked: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.hits.iter().map(|h| &h.record)
    }
}
