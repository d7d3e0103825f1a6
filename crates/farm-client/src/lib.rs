//! Ollama Farm Worker Client
//!
//! This crate provides the client used to talk to individual Ollama
//! workers: liveness probes, model catalog listing and version queries.

pub mod client;
pub mod error;
pub mod types;

pub use client::{OllamaClient, OllamaClientConfig, WorkerApi};
pub use error::ClientError;
pub use types::{ModelDetails, ModelInfo};
