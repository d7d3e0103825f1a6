//! API routes

mod health;
mod management;
pub mod metrics;
mod ollama;
mod proxy;

use axum::{Router, extract::DefaultBodyLimit};

use crate::state::{AppState, MetricsHandle};

/// Largest request body accepted for proxying (prompts may carry images)
const MAX_REQUEST_BODY: usize = 512 * 1024 * 1024;

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<MetricsHandle>) -> Router {
    let mut router = Router::new()
        // Health check
        .merge(health::routes())
        // Ollama-compatible catalog and version
        .merge(ollama::routes())
        // Management API
        .merge(management::routes())
        // Everything else is routed by model
        .fallback(proxy::forward)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY));

    // Add metrics endpoint if handle is provided
    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}
