//! Configuration management for ForensicBuddy
//!
//! TOML file with defaults and validation.
//! Location: ~/.forensicbuddy/config.toml
//!
//! API keys never live in the file; each provider section names the
//! environment variable that holds its key.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agent::executor::ExecutorConfig;
use crate::agent::history::HistoryWindow;
use crate::agent::router::RouterConfig;
use crate::errors::{ForensicError, Result};
use crate::llm::client::{DEFAULT_COMPLETION_MODEL, DEFAULT_COMPLETION_URL};
use crate::rag::reranking::cohere::{DEFAULT_COHERE_URL, DEFAULT_RERANK_MODEL};
use crate::rag::reranking::LexicalConfig;
use crate::rag::{CascadeTuning, ContextConfig, RetrievalPolicy};
use crate::store::embedding::http::{DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL};

const CONFIG_DIR: &str = ".forensicbuddy";
const CONFIG_FILE: &str = "config.toml";

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub completion: CompletionConfig,
    pub embedding: EmbeddingConfig,
    pub rerank: RerankConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextSettings,
    pub agents: AgentsConfig,
    pub knowledge: KnowledgeConfig,
    pub logging: LoggingConfig,
}

/// Structured completion provider (OpenAI-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint
    Http,
    /// On-device BERT model
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub base_url: String,
    /// Remote model name, or Hugging Face repo id for `local`
    pub model: String,
    pub api_key_env: String,
    /// Vector size of the remote model; `local` reads it from the model
    pub dimension: usize,
    pub timeout_secs: u64,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankProvider {
    Cohere,
    Lexical,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub provider: RerankProvider,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub lexical: LexicalConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Qdrant,
    /// In-process index; contents are lost on exit
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Qdrant gRPC url
    pub url: String,
    pub collection_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub n_primary: usize,
    pub n_secondary: usize,
    #[serde(flatten)]
    pub tuning: CascadeTuning,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    #[serde(flatten)]
    pub rendering: ContextConfig,
    pub history: HistoryWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub router: RouterConfig,
    pub executor: ExecutorConfig,
    pub consolidation_temperature: f32,
    /// Deadline for one whole query
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// JSON file with the fixed context and chart series
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMPLETION_URL.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Http,
            base_url: DEFAULT_EMBEDDING_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimension: 1536,
            timeout_secs: 30,
            batch_size: 32,
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: RerankProvider::Cohere,
            base_url: DEFAULT_COHERE_URL.to_string(),
            model: DEFAULT_RERANK_MODEL.to_string(),
            api_key_env: "COHERE_API_KEY".to_string(),
            timeout_secs: 15,
            lexical: LexicalConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Qdrant,
            url: "http://localhost:6334".to_string(),
            collection_prefix: "forensic_".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let policy = RetrievalPolicy::default();
        Self {
            n_primary: policy.n_primary,
            n_secondary: policy.n_secondary,
            tuning: CascadeTuning::default(),
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            executor: ExecutorConfig::default(),
            consolidation_temperature: 0.3,
            query_timeout_secs: 180,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RetrievalConfig {
    /// Base policy; tertiary inclusion is decided per query by routing
    pub fn policy(&self) -> RetrievalPolicy {
        RetrievalPolicy {
            n_primary: self.n_primary,
            n_secondary: self.n_secondary,
            include_tertiary: false,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(config_path) => Self::load_from_file(&config_path),
            None => Self::load_default(),
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ForensicError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ForensicError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Standard location if present, built-in defaults otherwise
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Config::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.retrieval.policy().validate().map_err(as_config_error)?;
        self.retrieval.tuning.validate().map_err(as_config_error)?;

        if self.embedding.provider == EmbeddingProvider::Http && self.embedding.dimension == 0 {
            return Err(ForensicError::ConfigError(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(ForensicError::ConfigError(
                "embedding.batch_size must be greater than 0".to_string(),
            ));
        }

        let weight = self.rerank.lexical.keyword_weight;
        if !(0.0..=1.0).contains(&weight) {
            return Err(ForensicError::ConfigError(format!(
                "rerank.lexical.keyword_weight must be between 0.0 and 1.0, got {}",
                weight
            )));
        }

        if self.agents.router.default_agents.is_empty() {
            return Err(ForensicError::ConfigError(
                "agents.router.default_agents must not be empty".to_string(),
            ));
        }

        if let Some(agent) = self
            .agents
            .router
            .default_agents
            .iter()
            .find(|a| a.is_opt_in())
        {
            return Err(ForensicError::ConfigError(format!(
                "'{}' is opt-in and cannot be a default agent",
                agent
            )));
        }

        if self.agents.executor.max_concurrency == 0 || self.agents.executor.agent_timeout_ms == 0 {
            return Err(ForensicError::ConfigError(
                "agents.executor limits must be greater than 0".to_string(),
            ));
        }

        if self.agents.query_timeout_secs == 0
            || self.completion.timeout_secs == 0
            || self.embedding.timeout_secs == 0
            || self.rerank.timeout_secs == 0
        {
            return Err(ForensicError::ConfigError(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ForensicError::ConfigError(format!(
                    "Invalid log level: {}",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ForensicError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ForensicError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ForensicError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Knowledge file path with `~` expanded
    pub fn knowledge_path(&self) -> Option<PathBuf> {
        self.knowledge.path.as_deref().map(Self::expand_path)
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }
}

/// Non-empty value of the environment variable `name`
pub fn api_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn as_config_error(err: ForensicError) -> ForensicError {
    match err {
        ForensicError::InvalidInput(msg) => ForensicError::ConfigError(msg),
        other => other,
    }
}
