//! Ollama embedding provider
//!
//! Connects to an Ollama-compatible `/api/embed` endpoint. Transient
//! failures (connect errors, timeouts, 5xx) are retried with exponential
//! backoff; anything else fails immediately.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Embedder, EmbeddingError};

/// Retries after the initial attempt
const MAX_RETRIES: u32 = 4;
/// First backoff delay
const BACKOFF_BASE: Duration = Duration::from_millis(500);
/// Backoff ceiling
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Ollama embedding client
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Create a new embedder against `base_url` (e.g. `http://localhost:11434`)
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
        }
    }

    /// One backoff step: 500ms, 1s, 2s, 4s, capped at 8s
    fn backoff_delay(attempt: u32) -> Duration {
        BACKOFF_BASE
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(BACKOFF_CAP)
    }

    /// True when the failure is worth another attempt
    fn is_transient(error: &reqwest::Error) -> bool {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            return true;
        }
        error
            .status()
            .map(|status| status.is_server_error())
            .unwrap_or(false)
    }

    async fn request_embeddings(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let mut attempt = 0;
        loop {
            let result = self.client.post(&url).json(&request).send().await;

            let reason = match result {
                Ok(response) if response.status().is_success() => {
                    let parsed: EmbedResponse = response.json().await.map_err(|e| {
                        EmbeddingError::Upstream(format!("embedding response parse error: {e}"))
                    })?;
                    return self.check_dimensions(parsed.embeddings);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if !status.is_server_error() {
                        // 4xx is a caller bug or model misconfiguration; retrying won't help
                        return Err(EmbeddingError::Upstream(format!(
                            "embedding upstream rejected request ({status}): {body}"
                        )));
                    }
                    format!("embedding upstream returned {status}: {body}")
                }
                Err(e) if Self::is_transient(&e) => format!("embedding request failed: {e}"),
                Err(e) => {
                    return Err(EmbeddingError::Upstream(format!(
                        "embedding request failed: {e}"
                    )));
                }
            };

            if attempt >= MAX_RETRIES {
                return Err(EmbeddingError::Upstream(format!(
                    "{reason} (after {MAX_RETRIES} retries)"
                )));
            }
            let delay = Self::backoff_delay(attempt);
            warn!(model = %self.model, attempt, ?delay, "{reason}; retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn check_dimensions(&self, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        for vector in &vectors {
            if vector.len() != self.dimensions {
                return Err(EmbeddingError::Dimension {
                    expected: self.dimensions,
                    got: vector.len(),
                });
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".to_string()));
        }

        debug!(model = %self.model, chars = text.len(), "embedding text");
        let vectors = self.request_embeddings(vec![text]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Upstream("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(
                "batch contains empty text".to_string(),
            ));
        }

        let vectors = self
            .request_embeddings(texts.iter().map(String::as_str).collect())
            .await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Upstream(format!(
                "embedding count mismatch: sent {}, received {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
