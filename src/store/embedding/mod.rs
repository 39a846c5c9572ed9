//! Embedding providers
//!
//! The store only depends on the `EmbeddingService` trait; concrete
//! providers are an OpenAI-compatible HTTP endpoint and an on-device BERT
//! model run through candle.

pub mod http;
pub mod local;

pub use http::HttpEmbeddingClient;
pub use local::LocalEmbeddingService;

use async_trait::async_trait;

use crate::errors::ServiceError;

/// Turns text into a fixed-dimension vector
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    /// Embed several texts, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Output vector dimension
    fn dimension(&self) -> usize;
}

/// Reject vectors whose length differs from the advertised dimension
pub(crate) fn check_dimension(vector: &[f32], expected: usize) -> Result<(), ServiceError> {
    if vector.len() != expected {
        return Err(ServiceError::SchemaMismatch(format!(
            "Embedding has dimension {}, expected {}",
            vector.len(),
            expected
        )));
    }
    Ok(())
}
