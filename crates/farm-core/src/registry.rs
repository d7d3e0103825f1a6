//! Worker registry
//!
//! The Registry is responsible for:
//! - Owning every registered worker, keyed by unique name
//! - Starting and stopping each worker's pollers
//! - Selecting workers by group, model, availability and priority
//! - Aggregate model queries across the pool

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use farm_client::{OllamaClient, OllamaClientConfig, WorkerApi};
use parking_lot::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::error::CoreError;
use crate::options::{RegistryOptions, ResolvedOptions};
use crate::poller::spawn_pollers;
use crate::selector::{Where, matches, matches_state};
use crate::worker::{Properties, Worker};

pub(crate) struct RegistryInner {
    /// Map of worker name to worker
    workers: RwLock<HashMap<String, Arc<Worker>>>,
    options: ResolvedOptions,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        for worker in self.workers.get_mut().values() {
            worker.cancel();
        }
    }
}

/// Live registry of Ollama workers.
///
/// Cheap to clone; clones share the same workers. Registration spawns tokio
/// tasks and must happen inside a runtime.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("workers", &self.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a registry with default options
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    /// Create a registry, resolving unset options to their defaults
    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                workers: RwLock::new(HashMap::new()),
                options: options.resolve(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RegistryInner>) -> Self {
        Self { inner }
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.inner.options
    }

    /// Whether two handles refer to the same registry
    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a worker by URL, using the normalized URL as its name
    pub fn register_url(
        &self,
        endpoint: &str,
        properties: Option<Properties>,
    ) -> Result<bool, CoreError> {
        let url = parse_endpoint(endpoint)?;
        let name = url.to_string();
        Ok(self.register_endpoint(name, url, properties))
    }

    /// Register a worker by URL under an explicit name
    pub fn register(
        &self,
        name: &str,
        endpoint: &str,
        properties: Option<Properties>,
    ) -> Result<bool, CoreError> {
        let url = parse_endpoint(endpoint)?;
        Ok(self.register_endpoint(name.to_string(), url, properties))
    }

    fn register_endpoint(&self, name: String, url: Url, properties: Option<Properties>) -> bool {
        let config = OllamaClientConfig::new(url.clone());
        let client = OllamaClient::with_client(config, self.inner.options.client.clone());
        self.register_client(name, url, Arc::new(client), properties)
    }

    /// Register a worker with a caller-supplied API client.
    ///
    /// Returns `false` without touching anything if the name is taken.
    /// Otherwise inserts the worker and starts its pollers; the worker's
    /// status is unknown until the first poll completes.
    pub fn register_client(
        &self,
        name: impl Into<String>,
        base_url: Url,
        client: Arc<dyn WorkerApi>,
        properties: Option<Properties>,
    ) -> bool {
        let name = name.into();

        let worker = {
            let mut workers = self.inner.workers.write();
            if workers.contains_key(&name) {
                debug!("Worker {} already registered", name);
                return false;
            }

            let worker = Arc::new(Worker::new(
                name.clone(),
                base_url,
                client,
                properties.unwrap_or_default(),
                Arc::downgrade(&self.inner),
            ));
            workers.insert(name.clone(), worker.clone());
            metrics::gauge!("ollama_farm_workers_registered").set(workers.len() as f64);
            worker
        };

        info!(
            "Registered worker {} -> {} (group: {:?}, priority: {})",
            name,
            worker.base_url(),
            worker.group(),
            worker.priority()
        );

        spawn_pollers(worker, &self.inner.options);
        true
    }

    /// Remove a worker and stop its pollers
    pub fn unregister(&self, name: &str) -> Option<Arc<Worker>> {
        let removed = {
            let mut workers = self.inner.workers.write();
            let removed = workers.remove(name);
            metrics::gauge!("ollama_farm_workers_registered").set(workers.len() as f64);
            removed
        };

        if let Some(worker) = &removed {
            worker.cancel();
            info!("Unregistered worker {}", name);
        }
        removed
    }

    /// Stop every worker's pollers. Workers stay registered with their last
    /// known state.
    pub fn shutdown(&self) {
        let workers = self.inner.workers.read();
        for worker in workers.values() {
            worker.cancel();
        }
        info!("Stopped pollers for {} workers", workers.len());
    }

    pub fn get(&self, name: &str) -> Option<Arc<Worker>> {
        self.inner.workers.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.workers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.workers.read().is_empty()
    }

    /// All workers, sorted by name
    pub fn workers(&self) -> Vec<Arc<Worker>> {
        let mut workers: Vec<Arc<Worker>> = self.inner.workers.read().values().cloned().collect();
        workers.sort_by(|a, b| a.name().cmp(b.name()));
        workers
    }

    /// The matching worker with the lowest priority value
    pub fn first(&self, filter: Option<&Where>) -> Option<Arc<Worker>> {
        let workers = self.inner.workers.read();
        workers
            .values()
            .filter(|w| matches(w, filter))
            .min_by_key(|w| w.priority())
            .cloned()
    }

    /// All matching workers, sorted by ascending priority
    pub fn select(&self, filter: Option<&Where>) -> Vec<Arc<Worker>> {
        let mut selected: Vec<Arc<Worker>> = {
            let workers = self.inner.workers.read();
            workers
                .values()
                .filter(|w| matches(w, filter))
                .cloned()
                .collect()
        };
        selected.sort_by_key(|w| w.priority());
        selected
    }

    /// Number of online matching workers hosting each model
    pub fn model_counts(&self, filter: Option<&Where>) -> BTreeMap<String, usize> {
        let workers = self.inner.workers.read();
        let mut counts = BTreeMap::new();

        for worker in workers.values() {
            worker.with_state(|state| {
                let selected =
                    filter.is_none_or(|f| matches_state(worker.group(), state, Some(f)));
                if selected && !state.offline {
                    for model in state.models.keys() {
                        *counts.entry(model.clone()).or_insert(0) += 1;
                    }
                }
            });
        }

        counts
    }

    /// Every model hosted by at least one online worker, sorted
    pub fn all_models(&self) -> Vec<String> {
        let workers = self.inner.workers.read();
        let mut models = BTreeSet::new();

        for worker in workers.values() {
            worker.with_state(|state| {
                if !state.offline {
                    models.extend(state.models.keys().cloned());
                }
            });
        }

        models.into_iter().collect()
    }
}

/// Validate a worker endpoint: an absolute http(s) URL with a host
pub fn parse_endpoint(endpoint: &str) -> Result<Url, CoreError> {
    let url = Url::parse(endpoint.trim())
        .map_err(|e| CoreError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(CoreError::InvalidEndpoint(format!(
                "{}: unsupported scheme '{}'",
                endpoint, scheme
            )));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(CoreError::InvalidEndpoint(format!("{}: missing host", endpoint)));
    }

    Ok(url)
}
