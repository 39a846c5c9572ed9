//! Qdrant-backed index: one collection per category, cosine distance
#![allow(deprecated)]

use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        point_id::PointIdOptions, value::Kind, vectors_config::Config,
        with_payload_selector::SelectorOptions, Condition, CreateCollection,
        Distance, Filter, PointStruct, Range, SearchPoints, Value as QdrantValue, VectorParams,
        VectorsConfig, WithPayloadSelector,
    },
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::VectorIndex;
use crate::errors::{ForensicError, Result, ServiceError};
use crate::store::{Category, ChunkRecord, MetadataFilter, MetadataValue, ScoredChunk};

/// Namespace for Qdrant point ids derived from chunk ids
const POINT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x2b91_4d0c_7e6a_4f1b_8c35_d0e4_a917_6c02);

/// Qdrant vector index
pub struct QdrantIndex {
    client: QdrantClient,
    collection_prefix: String,
    dimension: usize,
}

impl QdrantIndex {
    /// Connect to a Qdrant server (gRPC url, e.g. http://localhost:6334)
    pub fn connect(url: &str, collection_prefix: &str, dimension: usize) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| ForensicError::ConfigError(format!("Qdrant client for {}: {}", url, e)))?;

        info!(url, prefix = collection_prefix, dimension, "Connected Qdrant index");

        Ok(Self {
            client,
            collection_prefix: collection_prefix.to_string(),
            dimension,
        })
    }

    fn collection_name(&self, category: Category) -> String {
        format!("{}{}", self.collection_prefix, category.as_str())
    }

    /// Point id for a chunk id; Qdrant only accepts integers and UUIDs
    pub fn point_id(chunk_id: &str) -> String {
        Uuid::new_v5(&POINT_ID_NAMESPACE, chunk_id.as_bytes()).to_string()
    }

    async fn collection_exists(&self, name: &str) -> std::result::Result<bool, ServiceError> {
        let collections = self.client.list_collections().await.map_err(unavailable)?;
        Ok(collections.collections.iter().any(|c| c.name == name))
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> std::result::Result<(), ServiceError> {
        self.client
            .create_collection(&CreateCollection {
                collection_name: name.to_string(),
                vectors_config: Some(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: dimension as u64,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })
            .await
            .map_err(unavailable)?;
        debug!(collection = name, dimension, "Created collection");
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(
        &self,
        category: Category,
        dimension: usize,
    ) -> std::result::Result<(), ServiceError> {
        if dimension != self.dimension {
            return Err(ServiceError::SchemaMismatch(format!(
                "Index configured for dimension {}, embedding provider produces {}",
                self.dimension, dimension
            )));
        }
        let name = self.collection_name(category);
        if !self.collection_exists(&name).await? {
            self.create_collection(&name, dimension).await?;
        }
        Ok(())
    }

    async fn upsert(
        &self,
        category: Category,
        points: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> std::result::Result<(), ServiceError> {
        if points.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|(record, vector)| {
                let payload: HashMap<String, QdrantValue> = record
                    .to_payload()
                    .into_iter()
                    .map(|(k, v)| (k, to_qdrant_value(v)))
                    .collect();
                PointStruct::new(Self::point_id(&record.id), vector, payload)
            })
            .collect();

        self.client
            .upsert_points_blocking(self.collection_name(category), None, points, None)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn search(
        &self,
        category: Category,
        vector: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> std::result::Result<Vec<ScoredChunk>, ServiceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let name = self.collection_name(category);

        let request = SearchPoints {
            collection_name: name.clone(),
            vector: vector.to_vec(),
            limit: limit as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            filter: to_qdrant_filter(filter),
            ..Default::default()
        };

        let response = match self.client.search_points(&request).await {
            Ok(response) => response,
            Err(e) => {
                if !self.collection_exists(&name).await? {
                    return Ok(Vec::new());
                }
                return Err(unavailable(e));
            }
        };

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            let payload: BTreeMap<String, MetadataValue> = point
                .payload
                .into_iter()
                .filter_map(|(k, v)| from_qdrant_value(&v).map(|v| (k, v)))
                .collect();

            match ChunkRecord::from_payload(payload) {
                Ok(record) => hits.push(ScoredChunk::new(record, 1.0 - point.score)),
                Err(e) => {
                    let id = point.id.and_then(|id| match id.point_id_options {
                        Some(PointIdOptions::Uuid(u)) => Some(u),
                        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                        None => None,
                    });
                    warn!(collection = %name, point = ?id, error = %e, "Skipping malformed point");
                }
            }
        }
        Ok(hits)
    }

    async fn clear(&self, category: Category) -> std::result::Result<(), ServiceError> {
        let name = self.collection_name(category);
        if self.collection_exists(&name).await? {
            self.client.delete_collection(&name).await.map_err(unavailable)?;
        }
        self.create_collection(&name, self.dimension).await?;
        info!(collection = %name, "Cleared collection");
        Ok(())
    }

    async fn count(&self, category: Category) -> std::result::Result<u64, ServiceError> {
        let name = self.collection_name(category);
        if !self.collection_exists(&name).await? {
            return Ok(0);
        }
        let info = self.client.collection_info(&name).await.map_err(unavailable)?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }
}

fn unavailable(err: impl std::fmt::Display) -> ServiceError {
    ServiceError::ProviderUnavailable(format!("Qdrant: {}", err))
}

fn to_qdrant_value(value: MetadataValue) -> QdrantValue {
    match value {
        MetadataValue::Text(s) => QdrantValue::from(s),
        MetadataValue::Integer(i) => QdrantValue::from(i),
        MetadataValue::Float(f) => QdrantValue::from(f),
        MetadataValue::Bool(b) => QdrantValue::from(b),
    }
}

fn from_qdrant_value(value: &QdrantValue) -> Option<MetadataValue> {
    match value.kind.as_ref()? {
        Kind::StringValue(s) => Some(MetadataValue::Text(s.clone())),
        Kind::IntegerValue(i) => Some(MetadataValue::Integer(*i)),
        Kind::DoubleValue(f) => Some(MetadataValue::Float(*f)),
        Kind::BoolValue(b) => Some(MetadataValue::Bool(*b)),
        _ => None,
    }
}

fn to_qdrant_filter(filter: &MetadataFilter) -> Option<Filter> {
    if filter.is_empty() {
        return None;
    }

    let conditions: Vec<Condition> = filter
        .conditions()
        .iter()
        .map(|(field, value)| match value {
            MetadataValue::Text(s) => Condition::matches(field.as_str(), s.clone()),
            MetadataValue::Integer(i) => Condition::matches(field.as_str(), *i),
            MetadataValue::Bool(b) => Condition::matches(field.as_str(), *b),
            MetadataValue::Float(f) => Condition::range(
                field.as_str(),
                Range {
                    gte: Some(*f),
                    lte: Some(*f),
                    ..Default::default()
                },
            ),
        })
        .collect();

    Some(Filter::must(conditions))
}
