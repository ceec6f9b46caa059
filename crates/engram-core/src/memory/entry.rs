//! Memory Entry - The fundamental unit of stored context
//!
//! Each memory represents one captured context event (or one consolidated
//! summary) with:
//! - Content and a flat scalar metadata map
//! - Access bookkeeping used by the scoring model
//! - An embedding vector of the collection's configured dimension
//! - Provenance (`source_ids`) for consolidated memories

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// MEMORY KINDS
// ============================================================================

/// The typed variants of a memory
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// A raw captured context event
    #[default]
    Episodic,
    /// A generated summary over a set of episodic memories
    Semantic,
    /// How-to knowledge
    Procedural,
    /// Self-referential knowledge about the assistant's own behavior
    Metacognitive,
}

impl MemoryKind {
    /// All memory kinds, in stats-reporting order
    pub const ALL: [MemoryKind; 4] = [
        MemoryKind::Episodic,
        MemoryKind::Semantic,
        MemoryKind::Procedural,
        MemoryKind::Metacognitive,
    ];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Episodic => "episodic",
            MemoryKind::Semantic => "semantic",
            MemoryKind::Procedural => "procedural",
            MemoryKind::Metacognitive => "metacognitive",
        }
    }

    /// Parse from string name; unknown names fall back to episodic
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "episodic" => MemoryKind::Episodic,
            "semantic" => MemoryKind::Semantic,
            "procedural" => MemoryKind::Procedural,
            "metacognitive" => MemoryKind::Metacognitive,
            _ => MemoryKind::Episodic,
        }
    }

    /// Name of the vector store collection holding this kind
    pub fn collection_name(&self) -> &'static str {
        match self {
            MemoryKind::Episodic => "episodic_memories",
            MemoryKind::Semantic => "semantic_memories",
            MemoryKind::Procedural => "procedural_memories",
            MemoryKind::Metacognitive => "metacognitive_memories",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// MEMORY
// ============================================================================

/// Metadata key carrying the originating session identifier
pub const META_SESSION_ID: &str = "session_id";

/// A single memory entry
///
/// Mutated only by access updates (`last_accessed_at`, `access_count`);
/// everything else is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Unique identifier (UUID v4), unique across all collections
    pub id: String,
    /// Which collection this memory lives in
    pub kind: MemoryKind,
    /// The captured or generated text
    pub content: String,
    /// When the memory was created
    pub created_at: DateTime<Utc>,
    /// When the memory was last retrieved
    pub last_accessed_at: DateTime<Utc>,
    /// Number of retrievals since creation
    pub access_count: u32,
    /// Embedding vector; empty until the processor has embedded the content
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Flat scalar metadata (`session_id`, `source`, ...). Unknown keys are
    /// preserved on round-trip.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// For semantic memories: ids of the episodic memories summarized.
    /// Empty for captured memories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ids: Vec<String>,
}

impl Memory {
    /// Create a new memory with fresh id and timestamps
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            embedding: Vec::new(),
            metadata: BTreeMap::new(),
            source_ids: Vec::new(),
        }
    }

    /// Attach metadata, dropping empty keys
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata.into_iter().filter(|(k, _)| !k.is_empty()).collect();
        self
    }

    /// The session this memory belongs to, if any
    pub fn session_id(&self) -> Option<&str> {
        self.metadata.get(META_SESSION_ID).map(String::as_str)
    }

    /// Record a retrieval: bump `access_count` and refresh `last_accessed_at`
    pub fn touch(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = Utc::now();
    }

    /// Age in fractional hours relative to `now`
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now - self.created_at).num_milliseconds() as f64 / 1000.0;
        (secs / 3600.0).max(0.0)
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for capturing a new context event
///
/// Uses `deny_unknown_fields` to reject malformed bridge payloads early.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaptureInput {
    /// The content to remember
    pub content: String,
    /// Flat scalar metadata (`session_id`, `source`, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Kind override; captures default to episodic. The snake_case alias
    /// keeps older bridge builds working.
    #[serde(default, alias = "memory_type", skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
}

impl CaptureInput {
    /// Create a capture input with content only
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
            memory_type: None,
        }
    }

    /// Resolved memory kind for this capture
    pub fn kind(&self) -> MemoryKind {
        self.memory_type
            .as_deref()
            .map(MemoryKind::parse_name)
            .unwrap_or_default()
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Live per-kind memory counts, read straight from the store
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub episodic: u64,
    pub semantic: u64,
    pub procedural: u64,
    pub metacognitive: u64,
    pub total: u64,
}

impl MemoryStats {
    /// Count for one kind
    pub fn for_kind(&self, kind: MemoryKind) -> u64 {
        match kind {
            MemoryKind::Episodic => self.episodic,
            MemoryKind::Semantic => self.semantic,
            MemoryKind::Procedural => self.procedural,
            MemoryKind::Metacognitive => self.metacognitive,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
