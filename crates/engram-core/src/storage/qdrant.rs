//! Qdrant REST adapter
//!
//! Talks to a Qdrant-compatible HTTP API. Each memory kind maps to its own
//! collection (cosine distance, configured dimension); associations live in
//! a sibling collection with 1-dim placeholder vectors since the graph
//! carries no geometry.
//!
//! Payloads hold the serialized record plus two index-backed fields:
//! `created_at_ts` (range index, backs `get_recent` ordering) and
//! `source_id` (keyword index, backs `associations_by_source`). The
//! `get_all` cursor is Qdrant's own `next_page_offset`, passed through
//! opaquely.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{Result, StorageError, VectorStore, ASSOCIATIONS_COLLECTION};
use crate::memory::{Association, Memory, MemoryKind};

/// Page size used when a filtered scroll has to walk a collection
const SCROLL_PAGE: usize = 256;

/// Qdrant REST client
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Value,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct ScrollPoint {
    payload: Value,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct CountResult {
    count: u64,
}

impl QdrantStore {
    /// Create a new adapter against `base_url` (e.g. `http://localhost:6333`)
    pub fn new(base_url: impl Into<String>, dimensions: usize, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            dimensions,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map transport/status failures onto the storage error taxonomy
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() || e.is_request() {
                StorageError::Transient(format!("request failed: {e}"))
            } else {
                StorageError::Upstream(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StorageError::Upstream(format!("response parse error: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(StorageError::Transient(format!("upstream {status}: {body}")))
        } else {
            Err(StorageError::Upstream(format!("upstream {status}: {body}")))
        }
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.url(&format!("/collections/{name}/exists")))
            .send()
            .await
            .map_err(|e| StorageError::Transient(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(StorageError::Upstream(format!(
                "collection existence check returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| StorageError::Upstream(format!("response parse error: {e}")))?;
        Ok(body["result"]["exists"].as_bool().unwrap_or(false))
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.send(self.client.put(self.url(&format!("/collections/{name}"))).json(&json!({
            "vectors": { "size": dimensions, "distance": "Cosine" }
        })))
        .await?;
        info!(collection = name, dimensions, "created collection");
        Ok(())
    }

    /// Payload index creation is advisory: queries still work without the
    /// index, only slower, so failures are logged and swallowed.
    async fn create_payload_index(&self, collection: &str, field: &str, schema: &str) {
        let result = self
            .send(
                self.client
                    .put(self.url(&format!("/collections/{collection}/index")))
                    .json(&json!({ "field_name": field, "field_schema": schema })),
            )
            .await;
        if let Err(e) = result {
            warn!(collection, field, "payload index creation failed: {e}");
        }
    }

    fn memory_point(memory: &Memory) -> Result<Value> {
        let mut payload = serde_json::to_value(memory)
            .map_err(|e| StorageError::Upstream(format!("memory serialization failed: {e}")))?;
        // The embedding travels as the point vector, not payload
        if let Some(map) = payload.as_object_mut() {
            map.remove("embedding");
        }
        payload["created_at_ts"] = json!(memory.created_at.timestamp());

        Ok(json!({
            "id": memory.id,
            "vector": memory.embedding,
            "payload": payload,
        }))
    }

    fn memory_from_payload(payload: Value, vector: Option<Vec<f32>>) -> Result<Memory> {
        let mut memory: Memory = serde_json::from_value(payload)
            .map_err(|e| StorageError::Upstream(format!("memory payload corrupt: {e}")))?;
        if let Some(vector) = vector {
            memory.embedding = vector;
        }
        Ok(memory)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collections(&self, dimensions: usize) -> Result<()> {
        if dimensions != self.dimensions {
            return Err(StorageError::Dimension {
                expected: self.dimensions,
                got: dimensions,
            });
        }

        for kind in MemoryKind::ALL {
            let name = kind.collection_name();
            if !self.collection_exists(name).await? {
                self.create_collection(name, dimensions).await?;
            }
            self.create_payload_index(name, "created_at_ts", "integer").await;
        }

        if !self.collection_exists(ASSOCIATIONS_COLLECTION).await? {
            self.create_collection(ASSOCIATIONS_COLLECTION, 1).await?;
        }
        self.create_payload_index(ASSOCIATIONS_COLLECTION, "sourceId", "keyword").await;
        Ok(())
    }

    async fn upsert(&self, memory: &Memory) -> Result<()> {
        if memory.embedding.len() != self.dimensions {
            return Err(StorageError::Dimension {
                expected: self.dimensions,
                got: memory.embedding.len(),
            });
        }

        let collection = memory.kind.collection_name();
        self.send(
            self.client
                .put(self.url(&format!("/collections/{collection}/points?wait=true")))
                .json(&json!({ "points": [Self::memory_point(memory)?] })),
        )
        .await?;
        debug!(memory_id = %memory.id, collection, "upserted memory");
        Ok(())
    }

    async fn query(
        &self,
        kind: MemoryKind,
        vector: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<(Memory, f32)>> {
        let collection = kind.collection_name();
        let body: Envelope<Vec<ScoredPoint>> = serde_json::from_value(
            self.send(
                self.client
                    .post(self.url(&format!("/collections/{collection}/points/search")))
                    .json(&json!({
                        "vector": vector,
                        "limit": limit,
                        "score_threshold": min_score,
                        "with_payload": true,
                        "with_vector": true,
                    })),
            )
            .await?,
        )
        .map_err(|e| StorageError::Upstream(format!("search response corrupt: {e}")))?;

        body.result
            .into_iter()
            .map(|point| {
                Self::memory_from_payload(point.payload, point.vector)
                    .map(|memory| (memory, point.score))
            })
            .collect()
    }

    async fn get_recent(&self, kind: MemoryKind, limit: usize) -> Result<Vec<Memory>> {
        let collection = kind.collection_name();
        let body: Envelope<ScrollResult> = serde_json::from_value(
            self.send(
                self.client
                    .post(self.url(&format!("/collections/{collection}/points/scroll")))
                    .json(&json!({
                        "limit": limit,
                        "with_payload": true,
                        "with_vector": true,
                        "order_by": { "key": "created_at_ts", "direction": "desc" },
                    })),
            )
            .await?,
        )
        .map_err(|e| StorageError::Upstream(format!("scroll response corrupt: {e}")))?;

        body.result
            .points
            .into_iter()
            .map(|point| Self::memory_from_payload(point.payload, point.vector))
            .collect()
    }

    async fn count(&self, kind: MemoryKind) -> Result<u64> {
        let collection = kind.collection_name();
        let body: Envelope<CountResult> = serde_json::from_value(
            self.send(
                self.client
                    .post(self.url(&format!("/collections/{collection}/points/count")))
                    .json(&json!({ "exact": true })),
            )
            .await?,
        )
        .map_err(|e| StorageError::Upstream(format!("count response corrupt: {e}")))?;
        Ok(body.result.count)
    }

    async fn delete(&self, kind: MemoryKind, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let collection = kind.collection_name();
        self.send(
            self.client
                .post(self.url(&format!("/collections/{collection}/points/delete?wait=true")))
                .json(&json!({ "points": ids })),
        )
        .await?;
        debug!(collection, count = ids.len(), "deleted memories");
        Ok(())
    }

    async fn get_all(
        &self,
        kind: MemoryKind,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<(Vec<Memory>, Option<String>)> {
        let collection = kind.collection_name();
        let mut request = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": true,
        });
        if let Some(cursor) = cursor {
            // The cursor is the next_page_offset we previously handed out
            request["offset"] =
                serde_json::from_str(&cursor).map_err(|_| StorageError::InvalidCursor(cursor))?;
        }

        let body: Envelope<ScrollResult> = serde_json::from_value(
            self.send(
                self.client
                    .post(self.url(&format!("/collections/{collection}/points/scroll")))
                    .json(&request),
            )
            .await?,
        )
        .map_err(|e| StorageError::Upstream(format!("scroll response corrupt: {e}")))?;

        let memories = body
            .result
            .points
            .into_iter()
            .map(|point| Self::memory_from_payload(point.payload, point.vector))
            .collect::<Result<Vec<_>>>()?;
        let next = body
            .result
            .next_page_offset
            .filter(|offset| !offset.is_null())
            .map(|offset| offset.to_string());
        Ok((memories, next))
    }

    async fn get_by_id(&self, kind: MemoryKind, id: &str) -> Result<Memory> {
        let collection = kind.collection_name();
        let body: Envelope<Vec<ScrollPoint>> = serde_json::from_value(
            self.send(
                self.client
                    .post(self.url(&format!("/collections/{collection}/points")))
                    .json(&json!({ "ids": [id], "with_payload": true, "with_vector": true })),
            )
            .await?,
        )
        .map_err(|e| StorageError::Upstream(format!("retrieve response corrupt: {e}")))?;

        body.result
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
            .and_then(|point| Self::memory_from_payload(point.payload, point.vector))
    }

    async fn store_association(&self, association: &Association) -> Result<()> {
        let payload = serde_json::to_value(association)
            .map_err(|e| StorageError::Upstream(format!("association serialization failed: {e}")))?;
        self.send(
            self.client
                .put(self.url(&format!(
                    "/collections/{ASSOCIATIONS_COLLECTION}/points?wait=true"
                )))
                .json(&json!({
                    "points": [{
                        "id": association.id,
                        "vector": [0.0],
                        "payload": payload,
                    }]
                })),
        )
        .await?;
        Ok(())
    }

    async fn associations_by_source(&self, id: &str) -> Result<Vec<Association>> {
        let mut associations = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut request = json!({
                "limit": SCROLL_PAGE,
                "with_payload": true,
                "filter": { "must": [{ "key": "sourceId", "match": { "value": id } }] },
            });
            if let Some(offset) = offset.take() {
                request["offset"] = offset;
            }

            let body: Envelope<ScrollResult> = serde_json::from_value(
                self.send(
                    self.client
                        .post(self.url(&format!(
                            "/collections/{ASSOCIATIONS_COLLECTION}/points/scroll"
                        )))
                        .json(&request),
                )
                .await?,
            )
            .map_err(|e| StorageError::Upstream(format!("scroll response corrupt: {e}")))?;

            for point in body.result.points {
                let association: Association = serde_json::from_value(point.payload)
                    .map_err(|e| StorageError::Upstream(format!("association payload corrupt: {e}")))?;
                associations.push(association);
            }

            match body.result.next_page_offset.filter(|o| !o.is_null()) {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(associations)
    }

    async fn delete_association(&self, id: &str) -> Result<()> {
        self.send(
            self.client
                .post(self.url(&format!(
                    "/collections/{ASSOCIATIONS_COLLECTION}/points/delete?wait=true"
                )))
                .json(&json!({ "points": [id] })),
        )
        .await?;
        Ok(())
    }
}
