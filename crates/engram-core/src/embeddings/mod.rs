//! Embedding client
//!
//! Converts text into fixed-dimension vectors by calling an external
//! embedding model. The dimension is fixed at system start; a mismatch from
//! upstream is a permanent configuration error, never retried.

mod ollama;

pub use ollama::OllamaEmbedder;

use async_trait::async_trait;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedding error kinds
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Transient or permanent upstream failure after retries are exhausted
    #[error("embedding upstream failed: {0}")]
    Upstream(String),
    /// Upstream returned a vector of the wrong dimension
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
    /// Empty or otherwise unusable input
    #[error("invalid embedding input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// EMBEDDER TRAIT
// ============================================================================

/// Text-to-vector client (C1)
///
/// Synchronous from the caller's perspective; implementations may retry
/// transient upstream failures internally. Callers in the request path rely
/// on the per-call deadline to bound latency.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// The fixed dimensionality of produced vectors
    fn dimensions(&self) -> usize;

    /// Upstream model name, for logs and stats
    fn model_name(&self) -> &str;
}

// ============================================================================
// SIMILARITY FUNCTIONS
// ============================================================================

/// Compute cosine similarity between two vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 {
        dot_product / denominator
    } else {
        0.0
    }
}

// ============================================================================
// TESTS
// ============================================================================
