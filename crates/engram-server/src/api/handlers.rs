//! API endpoint handlers

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use engram_core::{CaptureInput, ConsolidationTrigger, MemoryKind};

use super::{ApiError, AppState};

/// Default page size when the caller omits (or zeroes) `limit`
const DEFAULT_LIMIT: usize = 100;

/// Upper bound on one response page
const MAX_LIMIT: usize = 1000;

fn effective_limit(limit: Option<usize>) -> usize {
    match limit {
        // limit=0 means "use the default"
        None | Some(0) => DEFAULT_LIMIT,
        Some(limit) => limit.min(MAX_LIMIT),
    }
}

// ============================================================================
// CAPTURE
// ============================================================================

/// POST /journal — capture a context event
///
/// Returns once the synchronous portion completes; embedding, storage, and
/// association analysis finish in the background. Queue overflow is
/// deliberately invisible here (capture is advisory).
pub async fn capture(
    State(state): State<AppState>,
    Json(input): Json<CaptureInput>,
) -> Result<Json<Value>, ApiError> {
    let memory = state.journal.capture(input)?;
    Ok(Json(json!({ "memory": memory })))
}

// ============================================================================
// LISTING AND SEARCH
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
}

/// GET /journal?limit=N&type=K — most recent memories
pub async fn list_recent(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let kind = params
        .memory_type
        .as_deref()
        .map(MemoryKind::parse_name)
        .unwrap_or_default();
    let limit = effective_limit(params.limit);

    let memories = state.journal.get_recent(kind, limit).await?;
    Ok(Json(json!({ "count": memories.len(), "memories": memories })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchRequest {
    pub content: String,
    #[serde(default, alias = "memory_type")]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// POST /journal/search — semantic search with score annotation
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let kind = request
        .memory_type
        .as_deref()
        .map(MemoryKind::parse_name)
        .unwrap_or_default();
    let limit = effective_limit(request.limit);

    let ranked = state
        .journal
        .query(&request.content, Some(kind), limit)
        .await?;
    Ok(Json(json!({ "count": ranked.len(), "memories": ranked })))
}

/// GET /journal/{id} — fetch one memory, recording the access
pub async fn get_memory(
    State(state): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<Json<Value>, ApiError> {
    let memory = state.journal.retrieve(&id).await?;
    Ok(Json(json!({ "memory": memory })))
}

// ============================================================================
// CONSOLIDATION AND STATS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConsolidateParams {
    /// Diagnostic one-off batch-size override (clamped to the hard cap)
    pub max_batch_size: Option<usize>,
}

/// POST /journal/consolidate — run a manual consolidation pass
///
/// The request body is ignored. Batch failures are reported inside the
/// response; the call itself still returns 200.
pub async fn consolidate(
    State(state): State<AppState>,
    Query(params): Query<ConsolidateParams>,
) -> Json<Value> {
    let report = state
        .engine
        .consolidate_with_batch_size(ConsolidationTrigger::Manual, params.max_batch_size)
        .await;
    Json(serde_json::to_value(&report).unwrap_or_else(|_| json!({})))
}

/// GET /journal/stats — live per-kind counts
pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.journal.stats().await?;
    Ok(Json(json!({
        "episodic": stats.episodic,
        "semantic": stats.semantic,
        "procedural": stats.procedural,
        "metacognitive": stats.metacognitive,
        "total": stats.total,
        "droppedEvents": state.journal.dropped_events(),
    })))
}

// ============================================================================
// PROBES
// ============================================================================

/// GET /health — liveness
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /ready — readiness; pings the vector store
pub async fn ready(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match state.store.count(MemoryKind::Episodic).await {
        Ok(_) => Ok(Json(json!({ "status": "ready" }))),
        Err(e) => {
            warn!("readiness probe failed: {e}");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
