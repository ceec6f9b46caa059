//! Associations - typed, weighted directed edges between memories
//!
//! Every stored edge has its reverse stored alongside it, so the graph can
//! be walked from either endpoint with a single source-id lookup. Edge ids
//! are deterministic (UUID v5 over source/target/kind), which makes
//! re-running association analysis idempotent.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ASSOCIATION KINDS
// ============================================================================

/// The four link types of the association graph
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationKind {
    /// Created close together in time
    Temporal,
    /// Embeddings are similar
    Semantic,
    /// Same session
    Contextual,
    /// Lexical cause/effect evidence; edge points from cause to effect
    Causal,
}

impl AssociationKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationKind::Temporal => "temporal",
            AssociationKind::Semantic => "semantic",
            AssociationKind::Contextual => "contextual",
            AssociationKind::Causal => "causal",
        }
    }

    /// Parse from string name
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "temporal" => Some(AssociationKind::Temporal),
            "semantic" => Some(AssociationKind::Semantic),
            "contextual" => Some(AssociationKind::Contextual),
            "causal" => Some(AssociationKind::Causal),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ASSOCIATION
// ============================================================================

/// UUID v5 namespace for deterministic edge ids
const ASSOCIATION_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6e, 0x67, 0x72, 0x61, 0x6d, 0x2d, 0x61, 0x73, 0x73, 0x6f, 0x63, 0x2d, 0x00, 0x00, 0x00,
    0x01,
]);

/// A typed, weighted directed edge between two memories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    /// Deterministic edge id (UUID v5 over source, target, kind)
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub kind: AssociationKind,
    /// Edge weight in [0.0, 1.0]
    pub strength: f32,
    pub created_at: DateTime<Utc>,
    /// Optional annotations (e.g. the raw similarity score)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Association {
    /// Build an edge. Returns `None` for self-loops.
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: AssociationKind,
        strength: f32,
    ) -> Option<Self> {
        let source_id = source_id.into();
        let target_id = target_id.into();
        if source_id == target_id {
            return None;
        }
        Some(Self {
            id: Self::edge_id(&source_id, &target_id, kind),
            source_id,
            target_id,
            kind,
            strength: strength.clamp(0.0, 1.0),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
        })
    }

    /// Deterministic id for the (source, target, kind) triple
    pub fn edge_id(source_id: &str, target_id: &str, kind: AssociationKind) -> String {
        let name = format!("{source_id}\u{1f}{target_id}\u{1f}{}", kind.as_str());
        Uuid::new_v5(&ASSOCIATION_NAMESPACE, name.as_bytes()).to_string()
    }

    /// The reverse edge, sharing kind, strength, timestamp, and metadata
    pub fn reversed(&self) -> Self {
        Self {
            id: Self::edge_id(&self.target_id, &self.source_id, self.kind),
            source_id: self.target_id.clone(),
            target_id: self.source_id.clone(),
            kind: self.kind,
            strength: self.strength,
            created_at: self.created_at,
            metadata: self.metadata.clone(),
        }
    }

    /// Attach a metadata annotation
    pub fn with_note(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================
