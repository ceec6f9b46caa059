//! In-memory vector store
//!
//! Exact cosine scan over hash maps. Backs the test suites and the
//! `--in-memory` diagnostics mode of the server; semantics mirror the
//! Qdrant adapter point for point so the two are interchangeable behind
//! the trait.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Result, StorageError, VectorStore};
use crate::embeddings::cosine_similarity;
use crate::memory::{Association, Memory, MemoryKind};

#[derive(Default)]
struct Inner {
    /// kind -> id -> memory; BTreeMap keeps the scroll order stable
    memories: HashMap<MemoryKind, BTreeMap<String, Memory>>,
    /// edge id -> association
    associations: HashMap<String, Association>,
    dimensions: usize,
}

/// HashMap-backed [`VectorStore`]
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    /// Create an empty store; collections materialize on `ensure_collections`
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collections(&self, dimensions: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.dimensions != 0 && inner.dimensions != dimensions {
            return Err(StorageError::Dimension {
                expected: inner.dimensions,
                got: dimensions,
            });
        }
        inner.dimensions = dimensions;
        for kind in MemoryKind::ALL {
            inner.memories.entry(kind).or_default();
        }
        Ok(())
    }

    async fn upsert(&self, memory: &Memory) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.dimensions != 0 && memory.embedding.len() != inner.dimensions {
            return Err(StorageError::Dimension {
                expected: inner.dimensions,
                got: memory.embedding.len(),
            });
        }
        inner
            .memories
            .entry(memory.kind)
            .or_default()
            .insert(memory.id.clone(), memory.clone());
        Ok(())
    }

    async fn query(
        &self,
        kind: MemoryKind,
        vector: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<(Memory, f32)>> {
        let inner = self.inner.read().await;
        let mut scored: Vec<(Memory, f32)> = inner
            .memories
            .get(&kind)
            .into_iter()
            .flat_map(|collection| collection.values())
            .filter(|memory| !memory.embedding.is_empty())
            .map(|memory| (memory.clone(), cosine_similarity(vector, &memory.embedding)))
            .filter(|(_, score)| *score >= min_score)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn get_recent(&self, kind: MemoryKind, limit: usize) -> Result<Vec<Memory>> {
        let inner = self.inner.read().await;
        let mut memories: Vec<Memory> = inner
            .memories
            .get(&kind)
            .into_iter()
            .flat_map(|collection| collection.values())
            .cloned()
            .collect();
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        memories.truncate(limit);
        Ok(memories)
    }

    async fn count(&self, kind: MemoryKind) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.memories.get(&kind).map(|c| c.len() as u64).unwrap_or(0))
    }

    async fn delete(&self, kind: MemoryKind, ids: &[String]) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(collection) = inner.memories.get_mut(&kind) {
            for id in ids {
                collection.remove(id);
            }
        }
        Ok(())
    }

    async fn get_all(
        &self,
        kind: MemoryKind,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<(Vec<Memory>, Option<String>)> {
        let inner = self.inner.read().await;
        let collection = match inner.memories.get(&kind) {
            Some(collection) => collection,
            None => return Ok((Vec::new(), None)),
        };

        // Cursor = last id of the previous page; BTreeMap order keeps the
        // scroll stable across interleaved writes.
        let memories: Vec<Memory> = match &cursor {
            Some(last_id) => collection
                .range::<String, _>((
                    std::ops::Bound::Excluded(last_id.clone()),
                    std::ops::Bound::Unbounded,
                ))
                .take(limit)
                .map(|(_, memory)| memory.clone())
                .collect(),
            None => collection.values().take(limit).cloned().collect(),
        };

        let next = if memories.len() == limit {
            memories.last().map(|memory| memory.id.clone())
        } else {
            None
        };
        Ok((memories, next))
    }

    async fn get_by_id(&self, kind: MemoryKind, id: &str) -> Result<Memory> {
        let inner = self.inner.read().await;
        inner
            .memories
            .get(&kind)
            .and_then(|collection| collection.get(id))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn store_association(&self, association: &Association) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .associations
            .insert(association.id.clone(), association.clone());
        Ok(())
    }

    async fn associations_by_source(&self, id: &str) -> Result<Vec<Association>> {
        let inner = self.inner.read().await;
        Ok(inner
            .associations
            .values()
            .filter(|edge| edge.source_id == id)
            .cloned()
            .collect())
    }

    async fn delete_association(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.associations.remove(id);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
