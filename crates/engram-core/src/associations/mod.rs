//! Association tracker
//!
//! Runs after a new memory has been stored with its embedding. Four
//! analyses (temporal, semantic, causal, contextual) fan out in parallel;
//! each produces zero or more candidate edges, and a failure in one never
//! aborts the others. Every kept edge is written in both directions, and
//! deterministic edge ids make re-analysis idempotent.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::EngramConfig;
use crate::memory::{Association, AssociationKind, Memory, MemoryKind};
use crate::storage::{Result, VectorStore};

/// Recent-memory fetch size for the time-window analyses
const WINDOW_FETCH_LIMIT: usize = 200;

/// Minimum word length counted by the causal overlap score
const CAUSAL_WORD_MIN_LEN: usize = 4;

/// Overlap floor for causal edges
const CAUSAL_OVERLAP_FLOOR: f32 = 0.5;

// ============================================================================
// TRACKER
// ============================================================================

/// Discovers and persists associations for newly stored memories (C5)
#[derive(Clone)]
pub struct AssociationTracker {
    store: Arc<dyn VectorStore>,
    config: Arc<EngramConfig>,
}

impl AssociationTracker {
    /// Create a tracker over the given store
    pub fn new(store: Arc<dyn VectorStore>, config: Arc<EngramConfig>) -> Self {
        Self { store, config }
    }

    /// Analyze a newly stored memory and persist the discovered edges.
    /// Returns the number of forward edges written.
    pub async fn analyze(&self, memory: &Memory) -> usize {
        let mut tasks: JoinSet<(AssociationKind, Result<Vec<Association>>)> = JoinSet::new();

        {
            let tracker = self.clone();
            let memory = memory.clone();
            tasks.spawn(async move {
                (AssociationKind::Temporal, tracker.temporal_analysis(&memory).await)
            });
        }
        {
            let tracker = self.clone();
            let memory = memory.clone();
            tasks.spawn(async move {
                (AssociationKind::Semantic, tracker.semantic_analysis(&memory).await)
            });
        }
        {
            let tracker = self.clone();
            let memory = memory.clone();
            tasks.spawn(async move {
                (AssociationKind::Causal, tracker.causal_analysis(&memory).await)
            });
        }
        {
            let tracker = self.clone();
            let memory = memory.clone();
            tasks.spawn(async move {
                (AssociationKind::Contextual, tracker.contextual_analysis(&memory).await)
            });
        }

        let mut candidates = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(edges))) => candidates.extend(edges),
                Ok((kind, Err(e))) => {
                    warn!(memory_id = %memory.id, analysis = %kind, "association analysis failed: {e}");
                }
                Err(e) => warn!(memory_id = %memory.id, "association task panicked: {e}"),
            }
        }

        let mut stored = 0;
        let mut touched_sources = HashSet::new();
        for edge in candidates {
            if edge.strength < self.config.min_association_strength {
                continue;
            }
            let reverse = edge.reversed();
            if let Err(e) = self.store.store_association(&edge).await {
                warn!(memory_id = %memory.id, "failed to store association: {e}");
                continue;
            }
            if let Err(e) = self.store.store_association(&reverse).await {
                warn!(memory_id = %memory.id, "failed to store reverse association: {e}");
            }
            touched_sources.insert(edge.source_id.clone());
            touched_sources.insert(reverse.source_id.clone());
            stored += 1;
        }

        for source in touched_sources {
            if let Err(e) = self.enforce_cap(&source).await {
                warn!(memory_id = %source, "association cap enforcement failed: {e}");
            }
        }

        debug!(memory_id = %memory.id, edges = stored, "association analysis complete");
        stored
    }

    // ========================================================================
    // ANALYSES
    // ========================================================================

    /// Temporal: memories created within `W_t` of the new one.
    /// Strength = 1 - |dt| / W_t.
    async fn temporal_analysis(&self, memory: &Memory) -> Result<Vec<Association>> {
        let window = self.config.temporal_window.as_secs_f64();
        if window <= 0.0 {
            return Ok(Vec::new());
        }
        let recent = self
            .store
            .get_recent(MemoryKind::Episodic, WINDOW_FETCH_LIMIT)
            .await?;

        let mut edges = Vec::new();
        for other in recent {
            if other.id == memory.id {
                continue;
            }
            let delta = (memory.created_at - other.created_at)
                .num_milliseconds()
                .abs() as f64
                / 1000.0;
            if delta > window {
                continue;
            }
            let strength = (1.0 - delta / window) as f32;
            if let Some(edge) =
                Association::new(&memory.id, &other.id, AssociationKind::Temporal, strength)
            {
                edges.push(edge.with_note("delta_secs", format!("{delta:.1}")));
            }
        }
        Ok(edges)
    }

    /// Semantic: k-NN of the new embedding against all memory collections
    /// combined. Strength = similarity. Skipped when the embedding is empty.
    async fn semantic_analysis(&self, memory: &Memory) -> Result<Vec<Association>> {
        if memory.embedding.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        for kind in MemoryKind::ALL {
            let results = self
                .store
                .query(
                    kind,
                    &memory.embedding,
                    self.config.semantic_limit,
                    self.config.semantic_threshold,
                )
                .await?;
            hits.extend(results);
        }

        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let edges = hits
            .into_iter()
            .filter(|(other, _)| other.id != memory.id)
            .take(self.config.semantic_limit)
            .filter_map(|(other, similarity)| {
                Association::new(&memory.id, &other.id, AssociationKind::Semantic, similarity)
                    .map(|edge| edge.with_note("similarity", format!("{similarity:.3}")))
            })
            .collect();
        Ok(edges)
    }

    /// Causal: when the new content carries a causal trigger phrase, link it
    /// to lexically overlapping memories from the preceding `W_c` window.
    /// The edge points from the older memory (cause) to the newer (effect).
    async fn causal_analysis(&self, memory: &Memory) -> Result<Vec<Association>> {
        let content = memory.content.to_lowercase();
        let triggered = self
            .config
            .causal_triggers
            .iter()
            .any(|phrase| content.contains(phrase.as_str()));
        if !triggered {
            return Ok(Vec::new());
        }

        let window = self.config.causal_window.as_secs_f64();
        if window <= 0.0 {
            return Ok(Vec::new());
        }
        let recent = self
            .store
            .get_recent(MemoryKind::Episodic, WINDOW_FETCH_LIMIT)
            .await?;

        let mut edges = Vec::new();
        for other in recent {
            if other.id == memory.id || other.created_at >= memory.created_at {
                continue;
            }
            let delta = (memory.created_at - other.created_at).num_milliseconds() as f64 / 1000.0;
            if delta > window {
                continue;
            }
            let overlap = lexical_overlap(&other.content, &memory.content);
            if overlap < CAUSAL_OVERLAP_FLOOR {
                continue;
            }
            if let Some(edge) =
                Association::new(&other.id, &memory.id, AssociationKind::Causal, overlap)
            {
                edges.push(edge.with_note("overlap", format!("{overlap:.3}")));
            }
        }
        Ok(edges)
    }

    /// Contextual: other memories of the same session within `W_x`.
    /// Closeness falls off with recency rank within the session.
    async fn contextual_analysis(&self, memory: &Memory) -> Result<Vec<Association>> {
        let session_id = match memory.session_id() {
            Some(session_id) => session_id.to_string(),
            None => return Ok(Vec::new()),
        };

        let window = self.config.session_window.as_secs_f64();
        if window <= 0.0 {
            return Ok(Vec::new());
        }
        let recent = self
            .store
            .get_recent(MemoryKind::Episodic, WINDOW_FETCH_LIMIT)
            .await?;

        let mut session_members: Vec<Memory> = recent
            .into_iter()
            .filter(|other| other.id != memory.id)
            .filter(|other| other.session_id() == Some(session_id.as_str()))
            .filter(|other| {
                let delta = (memory.created_at - other.created_at)
                    .num_milliseconds()
                    .abs() as f64
                    / 1000.0;
                delta <= window
            })
            .collect();
        session_members.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let session_size = session_members.len();
        let edges = session_members
            .into_iter()
            .enumerate()
            .filter_map(|(rank, other)| {
                let strength = 1.0 - (rank as f32 + 1.0) / (session_size as f32 + 1.0);
                Association::new(&memory.id, &other.id, AssociationKind::Contextual, strength)
                    .map(|edge| edge.with_note("session_id", session_id.clone()))
            })
            .collect();
        Ok(edges)
    }

    // ========================================================================
    // CAP ENFORCEMENT
    // ========================================================================

    /// Keep at most `max_associations_per_memory` outgoing edges per memory,
    /// evicting the weakest (with their reverse edges) on overflow.
    async fn enforce_cap(&self, source_id: &str) -> Result<()> {
        let mut edges = self.store.associations_by_source(source_id).await?;
        let cap = self.config.max_associations_per_memory;
        if edges.len() <= cap {
            return Ok(());
        }

        edges.sort_by(|a, b| a.strength.partial_cmp(&b.strength).unwrap_or(std::cmp::Ordering::Equal));
        let excess = edges.len() - cap;
        for edge in edges.into_iter().take(excess) {
            self.store.delete_association(&edge.id).await?;
            let reverse_id = Association::edge_id(&edge.target_id, &edge.source_id, edge.kind);
            self.store.delete_association(&reverse_id).await?;
        }
        debug!(memory_id = %source_id, evicted = excess, "association cap enforced");
        Ok(())
    }
}

// ============================================================================
// LEXICAL OVERLAP
// ============================================================================

/// Shared content words (length >= 4) divided by the mean word count of the
/// two texts
fn lexical_overlap(a: &str, b: &str) -> f32 {
    let words_a = content_words(a);
    let words_b = content_words(b);
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let shared = words_a.intersection(&words_b).count() as f32;
    let mean = (words_a.len() + words_b.len()) as f32 / 2.0;
    (shared / mean).clamp(0.0, 1.0)
}

fn content_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() >= CAUSAL_WORD_MIN_LEN)
        .map(String::from)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
