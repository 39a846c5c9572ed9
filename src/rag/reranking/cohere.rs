//! Cohere rerank endpoint client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::stage::{RankedIndex, RerankService};
use crate::errors::{ForensicError, Result, ServiceError};

/// Default Cohere API base
pub const DEFAULT_COHERE_URL: &str = "https://api.cohere.ai";

/// Multilingual model; the corpus mixes Portuguese and English
pub const DEFAULT_RERANK_MODEL: &str = "rerank-multilingual-v2.0";

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RankedIndex>,
}

/// Cohere reranker
#[derive(Debug, Clone)]
pub struct CohereReranker {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl CohereReranker {
    pub fn new(base_url: &str, model: &str, api_key: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ForensicError::ConfigError(
                "Cohere reranker requires an API key".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ForensicError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            timeout,
        })
    }
}

#[async_trait]
impl RerankService for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> std::result::Result<Vec<RankedIndex>, ServiceError> {
        let url = format!("{}/v1/rerank", self.base_url);
        let body = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: top_n.min(documents.len()),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout {
                        duration_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    ServiceError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status, &text));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::SchemaMismatch(format!("Rerank response: {}", e)))?;
        Ok(parsed.results)
    }

    fn name(&self) -> &str {
        "cohere"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn docs() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    #[tokio::test]
    async fn test_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rerank"))
            .and(header("authorization", "Bearer key"))
            .and(body_partial_json(json!({"model": DEFAULT_RERANK_MODEL, "top_n": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"index": 2, "relevance_score": 0.9},
                    {"index": 0, "relevance_score": 0.4}
                ]
            })))
            .mount(&server)
            .await;

        let reranker = CohereReranker::new(
            &server.uri(),
            DEFAULT_RERANK_MODEL,
            "key".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        let ranked = reranker.rerank("q", &docs(), 2).await.unwrap();
        assert_eq!(ranked[0].index, 2);
        assert_eq!(ranked[1].index, 0);
    }

    #[tokio::test]
    async fn test_unauthorized_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api token"))
            .mount(&server)
            .await;

        let reranker =
            CohereReranker::new(&server.uri(), "m", "bad".to_string(), Duration::from_secs(5))
                .unwrap();
        let err = reranker.rerank("q", &docs(), 2).await.unwrap_err();
        assert_eq!(err.kind(), "rejected");
    }

    #[test]
    fn test_requires_key() {
        assert!(CohereReranker::new(DEFAULT_COHERE_URL, "m", " ".to_string(), Duration::from_secs(1)).is_err());
    }
}
