//! Error types for ForensicBuddy
//!
//! Two layers:
//! - `ServiceError`: failure of one external call (embedding, rerank,
//!   structured completion), classified by kind so callers branch on the
//!   kind instead of message text.
//! - `ForensicError`: query-level taxonomy surfaced by the answering core.

use crate::store::Category;
use thiserror::Error;

/// Failure of a single external provider call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Provider unreachable, refused, or answered with a server error
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider answered, but the payload does not match the expected schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Call did not finish in time
    #[error("Provider call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Local data the call depends on is absent
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Provider refused the request outright (4xx other than throttling)
    #[error("Provider rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Caller passed malformed input (programming error, never retried)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    /// Short stable name of the failure kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::ProviderUnavailable(_) => "provider_unavailable",
            ServiceError::SchemaMismatch(_) => "schema_mismatch",
            ServiceError::Timeout { .. } => "timeout",
            ServiceError::MissingData(_) => "missing_data",
            ServiceError::Rejected { .. } => "rejected",
            ServiceError::InvalidInput(_) => "invalid_input",
        }
    }

    /// Transient failures worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::ProviderUnavailable(_) | ServiceError::Timeout { .. }
        )
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message: String = body.chars().take(300).collect();
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
        {
            ServiceError::ProviderUnavailable(format!("{}: {}", status, message))
        } else {
            ServiceError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout { duration_ms: 0 }
        } else if err.is_decode() {
            ServiceError::SchemaMismatch(err.to_string())
        } else {
            ServiceError::ProviderUnavailable(err.to_string())
        }
    }
}

/// Main error type for the answering core
#[derive(Error, Debug)]
pub enum ForensicError {
    /// Store or embedding provider failure; fatal for the query
    #[error("Retrieval unavailable for category {category}: {source}")]
    RetrievalUnavailable {
        category: Category,
        #[source]
        source: ServiceError,
    },

    /// Reranking provider failure; recovered inside the rerank stage
    #[error("Rerank unavailable: {0}")]
    RerankUnavailable(#[source] ServiceError),

    /// A specialist agent failed; recovered by excluding it
    #[error("Agent '{agent}' failed: {source}")]
    AgentFailure {
        agent: String,
        #[source]
        source: ServiceError,
    },

    /// Routing call failed; recovered with the default agent set
    #[error("Routing failed: {0}")]
    RoutingFailure(#[source] ServiceError),

    /// Final synthesis failed; fatal, there is no lower fallback
    #[error("Consolidation failed: {0}")]
    ConsolidationFailure(#[source] ServiceError),

    /// Malformed caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid query phase transition
    #[error("Invalid phase transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// Query deadline elapsed
    #[error("Query timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, ForensicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_unavailable_display() {
        let err = ForensicError::RetrievalUnavailable {
            category: Category::PortfolioFacts,
            source: ServiceError::ProviderUnavailable("connection refused".to_string()),
        };
        let text = err.to_string();
        assert!(text.contains("portfolio_facts"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ServiceError::ProviderUnavailable("x".into()).is_transient());
        assert!(ServiceError::Timeout { duration_ms: 10 }.is_transient());
        assert!(!ServiceError::SchemaMismatch("x".into()).is_transient());
        assert!(!ServiceError::InvalidInput("x".into()).is_transient());
    }

    #[test]
    fn test_status_classification() {
        let throttled = ServiceError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(throttled.is_transient());

        let unauthorized = ServiceError::from_status(reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert_eq!(unauthorized.kind(), "rejected");
        assert!(!unauthorized.is_transient());

        let down = ServiceError::from_status(reqwest::StatusCode::BAD_GATEWAY, "");
        assert_eq!(down.kind(), "provider_unavailable");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ServiceError::Timeout { duration_ms: 1 }.kind(), "timeout");
        assert_eq!(
            ServiceError::SchemaMismatch(String::new()).kind(),
            "schema_mismatch"
        );
    }
}
