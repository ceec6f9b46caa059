//! Journal - the domain façade over embedding, storage, and scoring
//!
//! Stores and retrieves memories, maintains per-memory access bookkeeping,
//! and annotates query results with composite scores. The capture path is
//! deliberately split: the synchronous portion assigns identity and
//! enqueues; embedding, upsert, and association analysis all happen on the
//! processor worker so a slow upstream can never stall the caller.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngramConfig;
use crate::embeddings::{Embedder, EmbeddingError};
use crate::memory::{Association, CaptureInput, Memory, MemoryKind, MemoryStats};
use crate::processor::ProcessorHandle;
use crate::scoring::{score_memory, MemoryScore, ScoreWeights};
use crate::storage::{StorageError, VectorStore};

/// Cached query embeddings; repeated searches skip the embedding upstream
const QUERY_CACHE_CAPACITY: usize = 128;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Journal error kinds
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// Malformed input; surfaced as 4xx, never retried
    #[error("invalid input: {0}")]
    Validation(String),
    /// Memory id lookup failed
    #[error("memory not found: {0}")]
    NotFound(String),
    /// Embedding upstream failure
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector store failure
    #[error("storage failed: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for JournalError {
    fn from(error: StorageError) -> Self {
        // The store's NotFound is the journal's NotFound; everything else
        // stays a storage failure.
        match error {
            StorageError::NotFound(id) => JournalError::NotFound(id),
            other => JournalError::Storage(other),
        }
    }
}

/// Journal result type
pub type Result<T> = std::result::Result<T, JournalError>;

// ============================================================================
// QUERY RESULTS
// ============================================================================

/// A query hit: the memory plus its score snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMemory {
    #[serde(flatten)]
    pub memory: Memory,
    pub score: MemoryScore,
}

// ============================================================================
// JOURNAL
// ============================================================================

/// Domain façade combining the embedding client, the vector store, and the
/// scoring model (C4)
pub struct Journal {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    processor: ProcessorHandle,
    weights: ScoreWeights,
    decay_rate: f64,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl Journal {
    /// Create a journal over the given backends
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        processor: ProcessorHandle,
        config: &EngramConfig,
    ) -> Self {
        // Capacity is a compile-time non-zero constant
        let capacity = NonZeroUsize::new(QUERY_CACHE_CAPACITY).expect("non-zero capacity");
        Self {
            store,
            embedder,
            processor,
            weights: config.score_weights,
            decay_rate: config.decay_rate,
            query_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Capture a context event
    ///
    /// Synchronous portion only: validate, assign id/timestamps/kind, and
    /// enqueue for background processing. Returns the provisional record;
    /// its embedding is filled in by the worker. Queue overflow is invisible
    /// to the caller (capture is advisory), but counted.
    pub fn capture(&self, input: CaptureInput) -> Result<Memory> {
        let content = input.content.trim();
        if content.is_empty() {
            return Err(JournalError::Validation("content cannot be empty".to_string()));
        }

        let kind = input.kind();
        let memory = Memory::new(kind, content).with_metadata(input.metadata);
        self.processor.enqueue_new_context(memory.clone());
        debug!(memory_id = %memory.id, kind = %kind, "captured context event");
        Ok(memory)
    }

    /// Low-level store: embed when the embedding is missing, then upsert.
    ///
    /// Used by the processor worker for episodic writes and by the
    /// consolidation engine for semantic writes. Idempotent on id.
    pub async fn store(&self, mut memory: Memory) -> Result<Memory> {
        if memory.embedding.is_empty() {
            memory.embedding = self.embedder.embed(&memory.content).await?;
        }
        if memory.embedding.len() != self.embedder.dimensions() {
            return Err(JournalError::Embedding(EmbeddingError::Dimension {
                expected: self.embedder.dimensions(),
                got: memory.embedding.len(),
            }));
        }
        self.store.upsert(&memory).await?;
        Ok(memory)
    }

    /// Fetch one memory by id, recording the access
    pub async fn retrieve(&self, id: &str) -> Result<Memory> {
        let mut memory = self.find(id).await?;
        memory.touch();
        self.store.upsert(&memory).await?;
        Ok(memory)
    }

    /// Fetch one memory by id without touching access bookkeeping
    pub async fn find(&self, id: &str) -> Result<Memory> {
        for kind in MemoryKind::ALL {
            match self.store.get_by_id(kind, id).await {
                Ok(memory) => return Ok(memory),
                Err(StorageError::NotFound(_)) => continue,
                Err(other) => return Err(other.into()),
            }
        }
        Err(JournalError::NotFound(id.to_string()))
    }

    /// Semantic search: embed the text, run k-NN against the filtered
    /// collection(s), and annotate each hit with its composite score.
    /// Results are ordered by non-increasing composite score.
    pub async fn query(
        &self,
        text: &str,
        kind_filter: Option<MemoryKind>,
        limit: usize,
    ) -> Result<Vec<RankedMemory>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(JournalError::Validation("query text cannot be empty".to_string()));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self.query_embedding(text).await?;
        let kinds: Vec<MemoryKind> = match kind_filter {
            Some(kind) => vec![kind],
            None => MemoryKind::ALL.to_vec(),
        };

        let mut ranked = Vec::new();
        for kind in kinds {
            let hits = self.store.query(kind, &vector, limit, 0.0).await?;
            for (memory, similarity) in hits {
                let assoc_count = self.association_count(&memory.id).await?;
                let score = score_memory(
                    &memory,
                    assoc_count,
                    similarity,
                    self.decay_rate,
                    &self.weights,
                );
                ranked.push(RankedMemory { memory, score });
            }
        }

        ranked.sort_by(|a, b| {
            b.score
                .composite
                .partial_cmp(&a.score.composite)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Most recently created memories of a kind; pass-through to the store
    pub async fn get_recent(&self, kind: MemoryKind, limit: usize) -> Result<Vec<Memory>> {
        Ok(self.store.get_recent(kind, limit).await?)
    }

    /// Live per-kind counts, read from the store on every call
    pub async fn stats(&self) -> Result<MemoryStats> {
        let mut stats = MemoryStats::default();
        for kind in MemoryKind::ALL {
            let count = self.store.count(kind).await?;
            match kind {
                MemoryKind::Episodic => stats.episodic = count,
                MemoryKind::Semantic => stats.semantic = count,
                MemoryKind::Procedural => stats.procedural = count,
                MemoryKind::Metacognitive => stats.metacognitive = count,
            }
            stats.total += count;
        }
        Ok(stats)
    }

    /// Outgoing associations of a memory
    pub async fn associations(&self, id: &str) -> Result<Vec<Association>> {
        Ok(self.store.associations_by_source(id).await?)
    }

    /// Score a memory outside a query (relevance 0), e.g. for candidate
    /// selection during consolidation
    pub async fn score(&self, memory: &Memory) -> Result<MemoryScore> {
        let assoc_count = self.association_count(&memory.id).await?;
        Ok(score_memory(
            memory,
            assoc_count,
            0.0,
            self.decay_rate,
            &self.weights,
        ))
    }

    /// Number of dropped capture events since startup
    pub fn dropped_events(&self) -> u64 {
        self.processor.dropped_events()
    }

    /// Direct store access for components layered on the journal
    pub fn store_backend(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.store)
    }

    async fn association_count(&self, id: &str) -> Result<usize> {
        Ok(self.store.associations_by_source(id).await?.len())
    }

    /// Embed a query, consulting the LRU cache first
    async fn query_embedding(&self, text: &str) -> Result<Vec<f32>> {
        if let Ok(mut cache) = self.query_cache.lock() {
            if let Some(vector) = cache.get(text) {
                return Ok(vector.clone());
            }
        }

        let vector = self.embedder.embed(text).await?;
        if let Ok(mut cache) = self.query_cache.lock() {
            cache.put(text.to_string(), vector.clone());
        }
        Ok(vector)
    }
}

// ============================================================================
// TESTS
// ============================================================================
