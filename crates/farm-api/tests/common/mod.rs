//! Mock Ollama workers served over real sockets

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::RawQuery,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use farm_core::{Registry, RegistryOptions};
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const CATALOGS: [&str; 3] = [
    include_str!("../fixtures/tags1.json"),
    include_str!("../fixtures/tags2.json"),
    include_str!("../fixtures/tags3.json"),
];

/// A mock worker bound to an ephemeral port
pub struct MockWorker {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockWorker {
    /// Serve `catalog` from `/api/tags`; `id` is echoed in `x-worker`
    pub async fn start(id: &'static str, catalog: &'static str) -> Self {
        Self::serve(mock_routes(id, catalog)).await
    }

    pub async fn serve(router: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop serving and wait until the socket is closed
    pub async fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

pub fn mock_routes(id: &'static str, catalog: &'static str) -> Router {
    Router::new()
        .route("/", get(|| async { "Ollama is running" }))
        .route(
            "/api/tags",
            get(move || async move {
                ([("content-type", "application/json")], catalog).into_response()
            }),
        )
        .route(
            "/api/version",
            get(|| async { Json(json!({"version": "0.3.6"})) }),
        )
        .route(
            "/api/generate",
            post(move |RawQuery(query): RawQuery, headers: HeaderMap, body: Bytes| async move {
                let mut response = (StatusCode::OK, body).into_response();
                let out = response.headers_mut();
                out.insert("x-worker", HeaderValue::from_static(id));
                out.insert(
                    "x-query",
                    HeaderValue::from_str(&query.unwrap_or_default()).unwrap(),
                );
                if let Some(trace) = headers.get("x-trace-id") {
                    out.insert("x-trace-id", trace.clone());
                }
                response
            }),
        )
        .route(
            "/api/chat",
            post(|| async {
                (
                    StatusCode::IM_A_TEAPOT,
                    [("x-custom", "teapot")],
                    "short and stout",
                )
            }),
        )
}

/// Registry with short polling intervals
pub fn fast_registry() -> Registry {
    Registry::with_options(
        RegistryOptions::default()
            .with_heartbeat(Duration::from_secs(1))
            .with_models_ttl(Duration::from_secs(1)),
    )
}

/// Poll `condition` every 50ms until it holds or `limit` passes
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
