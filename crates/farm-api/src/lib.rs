//! Ollama Farm HTTP API
//!
//! This crate provides the Axum-based HTTP surface of Ollama Farm: the
//! Ollama-compatible catalog and version endpoints, the model-routed
//! proxy, and a small management API over the worker registry.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
