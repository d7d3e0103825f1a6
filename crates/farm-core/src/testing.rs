//! In-process worker fake for tests

use async_trait::async_trait;
use farm_client::{ClientError, ModelInfo, WorkerApi};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use url::Url;

use crate::worker::{Properties, Worker};

/// Scriptable [`WorkerApi`]: reachable or not, optionally never answering
pub(crate) struct FakeWorker {
    reachable: AtomicBool,
    hanging: AtomicBool,
    models: Mutex<Vec<ModelInfo>>,
    heartbeats: AtomicUsize,
    listings: AtomicUsize,
}

impl FakeWorker {
    pub(crate) fn new(models: &[&str]) -> Self {
        Self {
            reachable: AtomicBool::new(true),
            hanging: AtomicBool::new(false),
            models: Mutex::new(models.iter().map(|m| ModelInfo::named(*m)).collect()),
            heartbeats: AtomicUsize::new(0),
            listings: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub(crate) fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub(crate) fn set_models(&self, models: &[&str]) {
        *self.models.lock() = models.iter().map(|m| ModelInfo::named(*m)).collect();
    }

    pub(crate) fn heartbeats(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    pub(crate) fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<(), ClientError> {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::Status {
                status: 502,
                message: "unreachable".to_string(),
            })
        }
    }
}

#[async_trait]
impl WorkerApi for FakeWorker {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.answer().await?;
        Ok(self.models.lock().clone())
    }

    async fn heartbeat(&self) -> Result<(), ClientError> {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        self.answer().await
    }

    async fn version(&self) -> Result<String, ClientError> {
        self.answer().await?;
        Ok("0.3.6".to_string())
    }
}

/// A detached worker backed by a fake
pub(crate) fn fake_worker(name: &str, fake: Arc<FakeWorker>) -> Arc<Worker> {
    Arc::new(Worker::new(
        name.to_string(),
        fake_url(name),
        fake,
        Properties::default(),
        Weak::new(),
    ))
}

pub(crate) fn fake_url(name: &str) -> Url {
    Url::parse(&format!("http://{}.invalid:11434", name)).unwrap()
}
