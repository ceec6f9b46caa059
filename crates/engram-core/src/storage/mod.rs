//! Vector store adapter
//!
//! Typed collections (one per memory kind) of `(id, vector, payload)` plus a
//! sibling collection for associations. The adapter is the only component
//! that knows collection names; they are derived from [`MemoryKind`].
//!
//! All operations are atomic at the single-point level; no multi-point
//! transactions exist or are needed. Bidirectional association writes are
//! two single-point upserts, and readers tolerate observing only one
//! direction transiently.

mod memory_store;
mod qdrant;

pub use memory_store::InMemoryStore;
pub use qdrant::QdrantStore;

use async_trait::async_trait;

use crate::memory::{Association, Memory, MemoryKind};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error kinds
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Network-level or 5xx failure; the caller may retry within its bound
    #[error("vector store transient error: {0}")]
    Transient(String),
    /// Non-retryable upstream failure
    #[error("vector store error: {0}")]
    Upstream(String),
    /// Point lookup failed
    #[error("not found: {0}")]
    NotFound(String),
    /// Vector length does not match the collection's configured dimension
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
    /// A scroll cursor that this store never issued
    #[error("invalid scroll cursor: {0}")]
    InvalidCursor(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// VECTOR STORE TRAIT
// ============================================================================

/// Name of the association sibling collection
pub const ASSOCIATIONS_COLLECTION: &str = "associations";

/// Abstract vector store backend (C3)
///
/// Implementations: [`QdrantStore`] (production) and [`InMemoryStore`]
/// (tests and diagnostics).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the memory collections (with the given vector dimension) and
    /// the association collection if they do not exist. Idempotent.
    async fn ensure_collections(&self, dimensions: usize) -> Result<()>;

    /// Store or overwrite a memory by id
    async fn upsert(&self, memory: &Memory) -> Result<()>;

    /// Approximate k-NN by cosine similarity, descending score, filtered by
    /// `score >= min_score`
    async fn query(
        &self,
        kind: MemoryKind,
        vector: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<(Memory, f32)>>;

    /// Most recently created memories, `created_at` descending. Never issues
    /// a similarity query.
    async fn get_recent(&self, kind: MemoryKind, limit: usize) -> Result<Vec<Memory>>;

    /// Exact current count of the collection
    async fn count(&self, kind: MemoryKind) -> Result<u64>;

    /// Best-effort delete; missing ids are ignored
    async fn delete(&self, kind: MemoryKind, ids: &[String]) -> Result<()>;

    /// Stable paginated scroll. The cursor is opaque; pass `None` to start
    /// and feed the returned cursor back until it is `None`.
    async fn get_all(
        &self,
        kind: MemoryKind,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<(Vec<Memory>, Option<String>)>;

    /// Fetch one memory by id
    async fn get_by_id(&self, kind: MemoryKind, id: &str) -> Result<Memory>;

    /// Store one directed association edge (callers write the reverse edge
    /// themselves)
    async fn store_association(&self, association: &Association) -> Result<()>;

    /// All outgoing edges for a memory
    async fn associations_by_source(&self, id: &str) -> Result<Vec<Association>>;

    /// Delete one edge by id; missing ids are ignored
    async fn delete_association(&self, id: &str) -> Result<()>;
}
