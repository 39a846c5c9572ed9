//! On-device embeddings via candle (BERT family, mean pooling)

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::info;

use super::EmbeddingService;
use crate::errors::{ForensicError, Result, ServiceError};

/// Default multilingual sentence model
pub const DEFAULT_LOCAL_MODEL: &str = "intfloat/multilingual-e5-small";

struct Inner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// Local embedding service; inference runs on the blocking pool
#[derive(Clone)]
pub struct LocalEmbeddingService {
    inner: Arc<Inner>,
    dimension: usize,
    model_id: String,
}

impl LocalEmbeddingService {
    /// Load a model from the HuggingFace Hub (downloads on first use; blocking)
    pub fn load(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;
        let load_err = |what: &str, e: String| {
            ForensicError::ConfigError(format!("Embedding model {}: {}: {}", model_id, what, e))
        };

        let api = Api::new().map_err(|e| load_err("hub client", e.to_string()))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| load_err("config download", e.to_string()))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| load_err("tokenizer download", e.to_string()))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| load_err("weights download", e.to_string()))?;

        let config_contents = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_contents)?;
        let dimension = config.hidden_size;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| load_err("tokenizer", e.to_string()))?;

        // SAFETY: the safetensors file is owned by the hub cache and not mutated while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| load_err("weights", e.to_string()))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| load_err("model", e.to_string()))?;

        info!(model = model_id, dimension, "Loaded local embedding model");

        Ok(Self {
            inner: Arc::new(Inner {
                model,
                tokenizer,
                device,
            }),
            dimension,
            model_id: model_id.to_string(),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_sync(inner: &Inner, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let fail = |e: String| ServiceError::ProviderUnavailable(format!("Local inference: {}", e));

        let encodings = inner
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| fail(e.to_string()))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = encodings.len();

        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let offset = row * max_len;
            flat_ids[offset..offset + ids.len()].copy_from_slice(ids);
            flat_mask[offset..offset + mask.len()].copy_from_slice(mask);
        }

        let run = || -> candle_core::Result<Vec<Vec<f32>>> {
            let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &inner.device)?;
            let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &inner.device)?;
            let token_type_ids = token_ids.zeros_like()?;

            let hidden = inner
                .model
                .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
            let pooled = mean_pool(&hidden, &attention_mask)?;
            pooled.to_vec2::<f32>()
        };

        run().map_err(|e| fail(e.to_string()))
    }
}

/// Mean pooling with attention mask
fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask
        .unsqueeze(2)?
        .expand(hidden.shape())?
        .to_dtype(hidden.dtype())?;
    let summed = (hidden * &mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    summed.broadcast_div(&counts)
}

#[async_trait]
impl EmbeddingService for LocalEmbeddingService {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ServiceError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ServiceError::SchemaMismatch("Empty embedding batch".to_string()))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ServiceError> {
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || Self::embed_sync(&inner, &texts))
            .await
            .map_err(|e| ServiceError::ProviderUnavailable(format!("Embedding task: {}", e)))?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
