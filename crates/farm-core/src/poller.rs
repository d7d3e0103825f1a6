//! Background polling per worker
//!
//! Every worker gets two independent loops: a liveness check on the
//! heartbeat interval and a catalog refresh on the models TTL. Both check
//! once immediately, then tick until the worker's cancellation token fires.
//! Failures only change the worker's status and catalog.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use farm_client::ClientError;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

use crate::options::{HEARTBEAT_TIMEOUT, LIST_MODELS_TIMEOUT, ResolvedOptions};
use crate::worker::{Worker, WorkerStatus};

/// Start both poll loops for a worker
pub(crate) fn spawn_pollers(
    worker: Arc<Worker>,
    options: &ResolvedOptions,
) -> (JoinHandle<()>, JoinHandle<()>) {
    info!(
        "Starting pollers for worker {} (heartbeat: {:?}, models TTL: {:?})",
        worker.name(),
        options.heartbeat,
        options.models_ttl
    );

    let liveness = tokio::spawn(run_every(worker.clone(), options.heartbeat, |w| async move {
        check_liveness(&w).await
    }));
    let catalog = tokio::spawn(run_every(worker, options.models_ttl, |w| async move {
        refresh_catalog(&w).await
    }));

    (liveness, catalog)
}

async fn run_every<F, Fut>(worker: Arc<Worker>, period: Duration, check: F)
where
    F: Fn(Arc<Worker>) -> Fut,
    Fut: Future<Output = ()>,
{
    let token = worker.cancellation().clone();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // The first tick completes immediately
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = async {
                ticker.tick().await;
                check(worker.clone()).await;
            } => {}
        }
    }

    debug!("Poller for worker {} stopped", worker.name());
}

/// Probe a worker and record whether it answered
pub(crate) async fn check_liveness(worker: &Worker) {
    let client = worker.client();
    let outcome = bounded(HEARTBEAT_TIMEOUT, client.heartbeat()).await;
    record_poll("heartbeat", outcome.is_ok());

    let failure = outcome.as_ref().err().cloned();
    let previous = worker.record_heartbeat(outcome);
    log_transition(worker, "heartbeat", previous, failure);
}

/// Fetch a worker's model list and replace the cached catalog
pub(crate) async fn refresh_catalog(worker: &Worker) {
    let client = worker.client();
    let outcome = bounded(LIST_MODELS_TIMEOUT, client.list_models()).await;
    record_poll("models", outcome.is_ok());

    if let Ok(models) = &outcome {
        debug!("Worker {} reports {} models", worker.name(), models.len());
    }

    let failure = outcome.as_ref().err().cloned();
    let previous = worker.record_catalog(outcome);
    log_transition(worker, "models", previous, failure);
}

/// Run a worker API call under a deadline, flattening errors to text
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, String> {
    match timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {:?}", limit)),
    }
}

fn record_poll(kind: &'static str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    metrics::counter!("ollama_farm_polls_total", "kind" => kind, "result" => result).increment(1);
}

fn log_transition(worker: &Worker, kind: &str, previous: WorkerStatus, failure: Option<String>) {
    let current = worker.status();
    match failure {
        Some(e) if previous != WorkerStatus::Offline => {
            warn!("Worker {} is offline ({} failed: {})", worker.name(), kind, e);
        }
        Some(e) => {
            debug!("Worker {} still offline ({} failed: {})", worker.name(), kind, e);
        }
        None if previous != current => {
            info!("Worker {} is online", worker.name());
        }
        None => {}
    }
}
