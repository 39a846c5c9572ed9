//! Component wiring from configuration
//!
//! Builds the providers, the chunk store and the case assistant described by
//! a [`Config`]. Provider keys are read from the environment variables named
//! in the config.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::agent::{CaseAssistant, DomainKnowledge};
use crate::config::{api_key, Config, EmbeddingProvider, RerankProvider, StoreBackend};
use crate::errors::{ForensicError, Result};
use crate::llm::{CompletionService, OpenAiCompletionClient, RetryPolicy};
use crate::rag::reranking::{CohereReranker, LexicalReranker};
use crate::rag::RerankStage;
use crate::store::{
    ChunkStore, EmbeddingService, HttpEmbeddingClient, LocalEmbeddingService, MemoryIndex,
    QdrantIndex, VectorIndex,
};

pub fn build_completion(config: &Config) -> Result<Arc<dyn CompletionService>> {
    let settings = &config.completion;
    let key = api_key(&settings.api_key_env);
    if key.is_none() {
        warn!(env = %settings.api_key_env, "No completion API key set");
    }

    let client = OpenAiCompletionClient::new(
        &settings.base_url,
        &settings.model,
        key,
        Duration::from_secs(settings.timeout_secs),
    )?
    .with_retry(RetryPolicy::new(
        settings.max_attempts,
        settings.retry_base_delay_ms,
    ));
    Ok(Arc::new(client))
}

pub async fn build_embedder(config: &Config) -> Result<Arc<dyn EmbeddingService>> {
    let settings = &config.embedding;
    match settings.provider {
        EmbeddingProvider::Http => {
            let client = HttpEmbeddingClient::new(
                &settings.base_url,
                &settings.model,
                api_key(&settings.api_key_env),
                settings.dimension,
                Duration::from_secs(settings.timeout_secs),
            )?;
            Ok(Arc::new(client))
        }
        EmbeddingProvider::Local => {
            let model = settings.model.clone();
            let service = tokio::task::spawn_blocking(move || LocalEmbeddingService::load(&model))
                .await
                .map_err(|e| ForensicError::ConfigError(format!("Model loader panicked: {}", e)))??;
            Ok(Arc::new(service))
        }
    }
}

pub async fn build_store(config: &Config) -> Result<ChunkStore> {
    let embedder = build_embedder(config).await?;
    let index: Arc<dyn VectorIndex> = match config.store.backend {
        StoreBackend::Qdrant => Arc::new(QdrantIndex::connect(
            &config.store.url,
            &config.store.collection_prefix,
            embedder.dimension(),
        )?),
        StoreBackend::Memory => {
            warn!("Using in-memory index; ingested chunks are not persisted");
            Arc::new(MemoryIndex::new())
        }
    };
    Ok(ChunkStore::new(embedder, index).with_embed_batch(config.embedding.batch_size))
}

/// Rerank stage; a missing Cohere key disables reranking instead of failing
pub fn build_reranker(config: &Config) -> Result<RerankStage> {
    let settings = &config.rerank;
    let stage = match settings.provider {
        RerankProvider::None => RerankStage::disabled(),
        RerankProvider::Lexical => {
            RerankStage::new(Arc::new(LexicalReranker::with_config(settings.lexical.clone())))
        }
        RerankProvider::Cohere => match api_key(&settings.api_key_env) {
            Some(key) => RerankStage::new(Arc::new(CohereReranker::new(
                &settings.base_url,
                &settings.model,
                key,
                Duration::from_secs(settings.timeout_secs),
            )?)),
            None => {
                warn!(env = %settings.api_key_env, "No rerank API key set, reranking disabled");
                RerankStage::disabled()
            }
        },
    };
    Ok(stage)
}

pub fn load_knowledge(config: &Config) -> Result<Arc<DomainKnowledge>> {
    match config.knowledge_path() {
        Some(path) => Ok(Arc::new(DomainKnowledge::load(&path)?)),
        None => {
            info!("No knowledge file configured");
            Ok(Arc::new(DomainKnowledge::empty()))
        }
    }
}

pub async fn build_assistant(config: &Config) -> Result<CaseAssistant> {
    let completion = build_completion(config)?;
    let store = build_store(config).await?;
    let reranker = build_reranker(config)?;
    let knowledge = load_knowledge(config)?;

    info!(
        model = %config.completion.model,
        store = ?config.store.backend,
        rerank = reranker.is_enabled(),
        "Case assistant ready"
    );
    Ok(CaseAssistant::assemble(
        completion, store, reranker, knowledge, config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> Config {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        config.rerank.provider = RerankProvider::Lexical;
        config
    }

    #[tokio::test]
    async fn test_offline_assistant_builds() {
        let config = offline_config();
        let assistant = build_assistant(&config).await.unwrap();
        assert_eq!(assistant.retriever().registry().all().len(), 6);
    }

    #[test]
    fn test_cohere_without_key_is_disabled() {
        let mut config = Config::default();
        config.rerank.api_key_env = "FORENSICBUDDY_TEST_UNSET_RERANK_KEY".to_string();
        assert!(!build_reranker(&config).unwrap().is_enabled());

        config.rerank.provider = RerankProvider::None;
        assert!(!build_reranker(&config).unwrap().is_enabled());
    }

    #[test]
    fn test_missing_knowledge_file_fails() {
        let mut config = offline_config();
        config.knowledge.path = Some("/nonexistent/knowledge.json".to_string());
        assert!(load_knowledge(&config).is_err());
    }
}
