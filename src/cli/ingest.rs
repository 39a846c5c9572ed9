//! JSONL ingestion records
//!
//! One object per line:
//! `{"content": "...", "source_document": "statement.pdf", "source_page": 3,
//!   "relevance_tier": "high", "event_date": "2009-02-01", "portfolio": "P02",
//!   "amount_eur": 120000}`
//! Unknown keys become residual metadata. Ids are derived from content, so
//! repeated lines collapse to their first occurrence.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;
use tracing::warn;

use crate::errors::{ForensicError, Result};
use crate::store::{Category, ChunkRecord, ChunkStore, MetadataValue, RelevanceTier};

#[derive(Debug, Deserialize)]
struct IngestLine {
    content: String,
    source_document: String,
    #[serde(default)]
    source_page: Option<u32>,
    #[serde(default)]
    relevance_tier: Option<RelevanceTier>,
    #[serde(default)]
    event_date: Option<NaiveDate>,
    #[serde(default)]
    portfolio: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, MetadataValue>,
}

impl IngestLine {
    fn into_record(self, category: Category) -> ChunkRecord {
        let mut record = ChunkRecord::new(category, self.source_document, self.content);
        if let Some(page) = self.source_page {
            record = record.with_page(page);
        }
        if let Some(tier) = self.relevance_tier {
            record = record.with_relevance(tier);
        }
        if let Some(date) = self.event_date {
            record = record.with_event_date(date);
        }
        if let Some(portfolio) = self.portfolio {
            record = record.with_portfolio(portfolio);
        }
        for (key, value) in self.extra {
            record = record.with_extra(key, value);
        }
        record
    }
}

/// Parse every non-blank line; the first malformed line aborts with its number
///
/// The returned records have unique ids and are all valid, so the caller can
/// clear the category before storing them.
pub fn parse_records(reader: impl BufRead, category: Category) -> Result<Vec<ChunkRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: IngestLine = serde_json::from_str(&line).map_err(|e| {
            ForensicError::InvalidInput(format!("Line {}: {}", index + 1, e))
        })?;
        let record = parsed.into_record(category);
        record.validate()?;
        if !seen.insert(record.id.clone()) {
            warn!(
                line = index + 1,
                source = %record.source_document,
                "Skipping duplicate chunk"
            );
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

/// Replace a category's contents with `records`
///
/// Every record is checked before the category is cleared; a rejected set
/// leaves the stored contents untouched. `progress` receives the size of each
/// stored batch.
pub async fn replace_category(
    store: &ChunkStore,
    category: Category,
    records: Vec<ChunkRecord>,
    batch_size: usize,
    mut progress: impl FnMut(usize),
) -> Result<usize> {
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
                "Duplicate chunk id {} for {}",
                record.id, category
            )));
        }
    }

    store.clear(category).await?;

    let total = records.len();
    for batch in records.chunks(batch_size.max(1)) {
        store.add_batch(category, batch.to_vec()).await?;
        progress(batch.len());
    }
    Ok(total)
}
