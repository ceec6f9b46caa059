//! # Engram Core
//!
//! Persistent memory engine for AI assistants. Captured context events are
//! embedded into a vector space, stored as typed memories, linked by
//! automatically discovered associations, and periodically fused into
//! higher-order semantic memories by a generative model.
//!
//! - **Typed memories**: episodic, semantic, procedural, metacognitive
//! - **Association graph**: temporal, semantic, contextual, and causal
//!   edges, bidirectionally indexed
//! - **Composite scoring**: recency decay, access frequency, connectedness,
//!   and query relevance, computed on demand and never persisted
//! - **Actor-style pipeline**: a bounded event queue and a single worker
//!   keep capture latency flat while embedding and association analysis run
//!   in the background
//! - **Bounded-batch consolidation**: association-coherent groups of
//!   episodic memories summarized by an external LLM under a token budget
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use engram_core::{
//!     AssociationTracker, CaptureInput, ConsolidationEngine, EngramConfig,
//!     InMemoryStore, Journal, MemoryProcessor, OllamaEmbedder, OllamaGenerator,
//!     event_queue,
//! };
//!
//! let config = Arc::new(EngramConfig::from_env()?);
//! let store = Arc::new(InMemoryStore::new());
//! let embedder = Arc::new(OllamaEmbedder::new(
//!     &config.ollama_url,
//!     &config.embedding_model,
//!     config.embedding_dimensions,
//!     config.embed_timeout,
//! ));
//!
//! let (handle, queue) = event_queue(config.queue_capacity);
//! let journal = Arc::new(Journal::new(store.clone(), embedder, handle, &config));
//! let memory = journal.capture(CaptureInput::new("the build broke because of a stale lockfile"))?;
//! ```

// ============================================================================
// MODULES
// ============================================================================

pub mod associations;
pub mod config;
pub mod consolidation;
pub mod embeddings;
pub mod generative;
pub mod journal;
pub mod memory;
pub mod processor;
pub mod scoring;
pub mod storage;


// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Memory types
pub use memory::{
    Association, AssociationKind, CaptureInput, Memory, MemoryKind, MemoryStats, META_SESSION_ID,
};

// Scoring
pub use scoring::{
    association_score, decay_factor, frequency_score, score_memory, MemoryScore, ScoreWeights,
    DEFAULT_DECAY_RATE,
};

// Configuration
pub use config::{ConfigError, EngramConfig, BATCH_SIZE_HARD_CAP};

// Embedding client
pub use embeddings::{cosine_similarity, Embedder, EmbeddingError, OllamaEmbedder};

// Generative client
pub use generative::{Generator, GenerativeError, OllamaGenerator};

// Storage layer
pub use storage::{
    InMemoryStore, QdrantStore, StorageError, VectorStore, ASSOCIATIONS_COLLECTION,
};

// Journal
pub use journal::{Journal, JournalError, RankedMemory};

// Association tracker
pub use associations::AssociationTracker;

// Processor
pub use processor::{event_queue, EventQueue, MemoryEvent, MemoryProcessor, ProcessorHandle};

// Consolidation
pub use consolidation::{ConsolidateReport, ConsolidationEngine, ConsolidationTrigger};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AssociationTracker, CaptureInput, ConsolidateReport, ConsolidationEngine,
        ConsolidationTrigger, Embedder, EngramConfig, Generator, Journal, JournalError, Memory,
        MemoryKind, MemoryProcessor, MemoryStats, RankedMemory, ScoreWeights, VectorStore,
    };
}
