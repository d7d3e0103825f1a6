//! Application state

use farm_core::Registry;

pub use metrics_exporter_prometheus::PrometheusHandle as MetricsHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    /// Client for proxied requests, shared with the registry's workers
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(registry: Registry) -> Self {
        let client = registry.options().client.clone();
        Self { registry, client }
    }
}
