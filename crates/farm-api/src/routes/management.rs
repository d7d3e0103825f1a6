//! Management API over the worker registry
//!
//! Lists and inspects workers, registers and removes them at runtime, and
//! exposes selection and model-count queries.
//!
//! These routes are unauthenticated. Do not expose `/farm/*` beyond a
//! trusted network.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use farm_core::{Properties, Where, WorkerInfo, parse_endpoint};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /farm/workers`
#[derive(Debug, Deserialize)]
pub struct RegisterWorkerRequest {
    /// Worker base URL
    pub url: String,
    /// Defaults to the normalized URL
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, flatten)]
    pub properties: Properties,
}

/// GET /farm/workers - all registered workers
async fn list_workers(State(state): State<AppState>) -> Json<Vec<WorkerInfo>> {
    Json(state.registry.workers().iter().map(|w| w.info()).collect())
}

/// GET /farm/workers/{name}
async fn get_worker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WorkerInfo>, ApiError> {
    state
        .registry
        .get(&name)
        .map(|w| Json(w.info()))
        .ok_or_else(|| ApiError::NotFound(format!("Worker {}", name)))
}

/// POST /farm/workers - register a worker; an existing name is left as is
async fn register_worker(
    State(state): State<AppState>,
    Json(request): Json<RegisterWorkerRequest>,
) -> Result<(StatusCode, Json<WorkerInfo>), ApiError> {
    let url = parse_endpoint(&request.url)?;
    let name = match request.name {
        Some(name) if !name.is_empty() => name,
        _ => url.to_string(),
    };

    let created = state
        .registry
        .register(&name, url.as_str(), Some(request.properties))?;

    // Present unless unregistered concurrently
    let worker = state
        .registry
        .get(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Worker {}", name)))?;

    let status = if created {
        info!("Registered worker {} via management API", worker.name());
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(worker.info())))
}

/// DELETE /farm/workers/{name} - unregister a worker and stop its pollers
async fn unregister_worker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .unregister(&name)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| ApiError::NotFound(format!("Worker {}", name)))
}

/// GET /farm/select?group=&model=&availability= - matching workers by priority
async fn select_workers(
    State(state): State<AppState>,
    Query(filter): Query<Where>,
) -> Json<Vec<WorkerInfo>> {
    Json(
        state
            .registry
            .select(Some(&filter))
            .iter()
            .map(|w| w.info())
            .collect(),
    )
}

/// GET /farm/models?group=&model=&availability= - online workers per model
async fn model_counts(
    State(state): State<AppState>,
    Query(filter): Query<Where>,
) -> Json<BTreeMap<String, usize>> {
    Json(state.registry.model_counts(Some(&filter)))
}

/// Create management API routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/farm/workers", get(list_workers).post(register_worker))
        .route("/farm/workers/{name}", get(get_worker).delete(unregister_worker))
        .route("/farm/select", get(select_workers))
        .route("/farm/models", get(model_counts))
}
