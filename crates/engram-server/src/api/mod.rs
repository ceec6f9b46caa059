//! HTTP surface for the protocol bridge
//!
//! A thin, stateless request/response mapping over the journal and the
//! consolidation engine. Handlers never await background work; captures
//! return as soon as the synchronous portion completes.

pub mod handlers;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;

use engram_core::{
    ConsolidationEngine, EngramConfig, Journal, JournalError, StorageError, VectorStore,
};

// ============================================================================
// STATE
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub journal: Arc<Journal>,
    pub engine: Arc<ConsolidationEngine>,
    pub store: Arc<dyn VectorStore>,
    pub config: Arc<EngramConfig>,
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

/// Uniform journal-error to status-code mapping
pub struct ApiError(pub JournalError);

impl From<JournalError> for ApiError {
    fn from(error: JournalError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match &self.0 {
            JournalError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            JournalError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            JournalError::Embedding(engram_core::EmbeddingError::Dimension { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_permanent")
            }
            JournalError::Embedding(_) => (StatusCode::SERVICE_UNAVAILABLE, "upstream"),
            JournalError::Storage(StorageError::Transient(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_transient")
            }
            JournalError::Storage(StorageError::Dimension { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_permanent")
            }
            JournalError::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "upstream"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        (
            status,
            Json(json!({ "error": self.0.to_string(), "reason": reason })),
        )
            .into_response()
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the API router. Journal routes live under the configured prefix;
/// health and readiness stay at the root for probes.
pub fn router(state: AppState) -> Router {
    let prefix = state.config.api_prefix.trim_end_matches('/').to_string();

    let journal_routes = Router::new()
        .route("/journal", post(handlers::capture).get(handlers::list_recent))
        .route("/journal/search", post(handlers::search))
        .route("/journal/consolidate", post(handlers::consolidate))
        .route("/journal/stats", get(handlers::stats))
        .route("/journal/{id}", get(handlers::get_memory));

    Router::new()
        .nest(&prefix, journal_routes)
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
