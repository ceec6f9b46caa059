//! Ollama generative provider
//!
//! Connects to an Ollama-compatible `/api/generate` endpoint with streaming
//! disabled. The per-call deadline is the consolidation engine's contract:
//! a timed-out batch must fail cleanly, never partially persist.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Generator, GenerativeError};

/// Retries after the initial attempt
const MAX_RETRIES: u32 = 4;
/// First backoff delay
const BACKOFF_BASE: Duration = Duration::from_millis(500);
/// Backoff ceiling
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Ollama text-generation client
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    /// Create a new generator against `base_url` (e.g. `http://localhost:11434`)
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            timeout,
        }
    }

    fn backoff_delay(attempt: u32) -> Duration {
        BACKOFF_BASE
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(BACKOFF_CAP)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn consolidate(&self, prompt: &str) -> Result<String, GenerativeError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let mut attempt = 0;
        loop {
            debug!(model = %self.model, chars = prompt.len(), attempt, "generating summary");
            let result = self.client.post(&url).json(&request).send().await;

            let reason = match result {
                Ok(response) if response.status().is_success() => {
                    let parsed: GenerateResponse = response.json().await.map_err(|e| {
                        GenerativeError::Upstream(format!("generate response parse error: {e}"))
                    })?;
                    let text = parsed.response.trim().to_string();
                    if text.is_empty() {
                        return Err(GenerativeError::Upstream(
                            "model returned an empty summary".to_string(),
                        ));
                    }
                    return Ok(text);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if !status.is_server_error() {
                        return Err(GenerativeError::Upstream(format!(
                            "generate upstream rejected request ({status}): {body}"
                        )));
                    }
                    format!("generate upstream returned {status}: {body}")
                }
                Err(e) if e.is_timeout() => {
                    // A timeout means the prompt is too heavy for the model;
                    // retrying the same prompt would just burn another T_llm.
                    return Err(GenerativeError::Timeout {
                        seconds: self.timeout.as_secs(),
                    });
                }
                Err(e) if e.is_connect() || e.is_request() => {
                    format!("generate request failed: {e}")
                }
                Err(e) => {
                    return Err(GenerativeError::Upstream(format!(
                        "generate request failed: {e}"
                    )));
                }
            };

            if attempt >= MAX_RETRIES {
                return Err(GenerativeError::Upstream(format!(
                    "{reason} (after {MAX_RETRIES} retries)"
                )));
            }
            let delay = Self::backoff_delay(attempt);
            warn!(model = %self.model, attempt, ?delay, "{reason}; retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
