//! Worker state
//!
//! A [`Worker`] is one registered Ollama endpoint. Its group and priority are
//! fixed at registration; its status and model catalog are written only by
//! its own pollers and read by the registry's selection logic. Mutable state
//! sits behind a per-worker lock so polling one worker never blocks readers
//! of another.

use chrono::{DateTime, Utc};
use farm_client::{ModelInfo, WorkerApi};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::registry::{Registry, RegistryInner};

/// Static properties supplied at registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub priority: i64,
    /// Initial availability; overwritten by the first poll
    #[serde(default)]
    pub offline: bool,
}

/// Connectivity as last observed by either poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Registered, no poll has completed yet. Counts as online
    Unknown,
    Online,
    Offline,
}

/// Serializable snapshot of a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub name: String,
    pub url: String,
    pub group: String,
    pub priority: i64,
    pub status: WorkerStatus,
    pub models: Vec<String>,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Mutable part of a worker
#[derive(Debug, Default)]
pub(crate) struct WorkerState {
    pub(crate) offline: bool,
    pub(crate) models: HashMap<String, ModelInfo>,
    pub(crate) last_checked: Option<DateTime<Utc>>,
    pub(crate) last_error: Option<String>,
}

impl WorkerState {
    fn status(&self) -> WorkerStatus {
        match (self.last_checked, self.offline) {
            (_, true) => WorkerStatus::Offline,
            (None, false) => WorkerStatus::Unknown,
            (Some(_), false) => WorkerStatus::Online,
        }
    }
}

/// One registered Ollama endpoint
pub struct Worker {
    name: String,
    base_url: Url,
    client: Arc<dyn WorkerApi>,
    group: String,
    priority: i64,
    state: RwLock<WorkerState>,
    cancel: CancellationToken,
    registry: Weak<RegistryInner>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("group", &self.group)
            .field("priority", &self.priority)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub(crate) fn new(
        name: String,
        base_url: Url,
        client: Arc<dyn WorkerApi>,
        properties: Properties,
        registry: Weak<RegistryInner>,
    ) -> Self {
        Self {
            name,
            base_url,
            client,
            group: properties.group,
            priority: properties.priority,
            state: RwLock::new(WorkerState {
                offline: properties.offline,
                ..Default::default()
            }),
            cancel: CancellationToken::new(),
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL of the worker. Polls and proxied requests both append their
    /// path to it, so a worker mounted under a prefix keeps the prefix.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Client for the worker API
    pub fn client(&self) -> Arc<dyn WorkerApi> {
        self.client.clone()
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn online(&self) -> bool {
        !self.state.read().offline
    }

    pub fn status(&self) -> WorkerStatus {
        self.state.read().status()
    }

    /// Names of the cached models, sorted
    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.state.read().models.keys().cloned().collect();
        models.sort();
        models
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.state.read().models.contains_key(model)
    }

    /// Cached metadata for one model
    pub fn model(&self, model: &str) -> Option<ModelInfo> {
        self.state.read().models.get(model).cloned()
    }

    /// The registry this worker belongs to, while it is alive
    pub fn registry(&self) -> Option<Registry> {
        self.registry.upgrade().map(Registry::from_inner)
    }

    pub fn info(&self) -> WorkerInfo {
        let state = self.state.read();
        let mut models: Vec<String> = state.models.keys().cloned().collect();
        models.sort();

        WorkerInfo {
            name: self.name.clone(),
            url: self.base_url.to_string(),
            group: self.group.clone(),
            priority: self.priority,
            status: state.status(),
            models,
            last_checked: state.last_checked,
            last_error: state.last_error.clone(),
        }
    }

    /// Run `f` over a consistent snapshot of the mutable state
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&WorkerState) -> R) -> R {
        f(&self.state.read())
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop both poll loops
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Record a liveness outcome. Models are left untouched.
    ///
    /// Returns the status before the update.
    pub(crate) fn record_heartbeat(&self, outcome: Result<(), String>) -> WorkerStatus {
        let mut state = self.state.write();
        let previous = state.status();
        state.last_checked = Some(Utc::now());
        match outcome {
            Ok(()) => {
                state.offline = false;
                state.last_error = None;
            }
            Err(e) => {
                state.offline = true;
                state.last_error = Some(e);
            }
        }
        previous
    }

    /// Record a catalog outcome. Success replaces the cached models, failure
    /// clears them.
    ///
    /// Returns the status before the update.
    pub(crate) fn record_catalog(&self, outcome: Result<Vec<ModelInfo>, String>) -> WorkerStatus {
        // Build the new map before taking the lock
        let outcome = outcome.map(|models| {
            models
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect::<HashMap<_, _>>()
        });

        let mut state = self.state.write();
        let previous = state.status();
        state.last_checked = Some(Utc::now());
        match outcome {
            Ok(models) => {
                state.offline = false;
                state.models = models;
                state.last_error = None;
            }
            Err(e) => {
                state.offline = true;
                state.models.clear();
                state.last_error = Some(e);
            }
        }
        previous
    }
}
