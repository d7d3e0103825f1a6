//! Ollama-compatible read endpoints served by the farm itself

use axum::{Json, Router, extract::State, routing::get};
use farm_client::types::VersionResponse;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/tags - every model hosted by an online worker
async fn tags(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.all_models())
}

/// GET /api/version - version reported by the preferred online worker
async fn version(State(state): State<AppState>) -> Result<Json<VersionResponse>, ApiError> {
    let worker = state
        .registry
        .first(None)
        .ok_or_else(|| ApiError::Unavailable("No available Ollama instances".to_string()))?;

    debug!("Querying version from worker {}", worker.name());

    let version = worker.client().version().await.map_err(|e| {
        warn!("Version query to worker {} failed: {}", worker.name(), e);
        ApiError::Internal("Failed to get version".to_string())
    })?;

    Ok(Json(VersionResponse { version }))
}

/// Create Ollama-compatible routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tags", get(tags))
        .route("/api/version", get(version))
}
