//! Ollama Farm Core
//!
//! This crate provides the worker registry at the heart of Ollama Farm:
//! - Worker state (status, model catalog, group and priority)
//! - Background liveness and catalog polling per worker
//! - Worker selection by group, model, availability and priority

pub mod error;
pub mod options;
mod poller;
pub mod registry;
pub mod selector;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::CoreError;
pub use options::{
    DEFAULT_HEARTBEAT, DEFAULT_MODELS_TTL, HEARTBEAT_TIMEOUT, LIST_MODELS_TIMEOUT,
    RegistryOptions, ResolvedOptions,
};
pub use registry::{Registry, parse_endpoint};
pub use selector::{Availability, Where};
pub use worker::{Properties, Worker, WorkerInfo, WorkerStatus};
