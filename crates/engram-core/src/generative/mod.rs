//! Generative client
//!
//! Produces a consolidated natural-language summary from a prompt. One call
//! per batch; on timeout or upstream failure the batch is abandoned and
//! nothing is persisted.

mod ollama;

pub use ollama::OllamaGenerator;

use async_trait::async_trait;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Generative error kinds
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum GenerativeError {
    /// The per-invocation deadline elapsed
    #[error("generative call timed out after {seconds}s")]
    Timeout { seconds: u64 },
    /// Upstream failure after retries are exhausted
    #[error("generative upstream failed: {0}")]
    Upstream(String),
}

// ============================================================================
// GENERATOR TRAIT
// ============================================================================

/// Prompt-to-summary client (C2)
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a consolidated summary for the prompt
    async fn consolidate(&self, prompt: &str) -> Result<String, GenerativeError>;

    /// Upstream model name, for logs and stats
    fn model_name(&self) -> &str;
}
