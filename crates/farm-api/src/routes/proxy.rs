//! Model-routed proxy
//!
//! Any request not served by another route is forwarded to the worker
//! hosting the model named in its JSON body. The body is forwarded
//! byte-for-byte; only the `model` field is inspected.

use std::fmt;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderName, Method, Uri, header},
    response::Response,
};
use farm_core::Where;
use futures::TryStreamExt;
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use tracing::{debug, warn};
use url::Url;

use crate::error::ApiError;
use crate::state::AppState;

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Routing fields of a proxied request body
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RoutingEnvelope {
    pub model: String,
}

impl RoutingEnvelope {
    /// Extract `model` from a JSON object, skipping every other field
    pub(crate) fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let mut deserializer = serde_json::Deserializer::from_slice(body);
        let model = de::Deserializer::deserialize_map(&mut deserializer, ModelVisitor)
            .map_err(|_| ApiError::BadRequest("Invalid JSON body".to_string()))?;

        model
            .map(|model| Self { model })
            .ok_or_else(|| ApiError::BadRequest("Missing or invalid 'model' field".to_string()))
    }
}

/// Yields the `model` string, or `None` when absent or not a string
struct ModelVisitor;

impl<'de> Visitor<'de> for ModelVisitor {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut model = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == "model" {
                model = match map.next_value::<serde_json::Value>()? {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                };
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(model)
    }
}

/// Append the inbound path and query to a worker's base URL
fn target_url(base: &Url, uri: &Uri) -> Url {
    let mut url = base.clone();
    let path = format!("{}{}", base.path().trim_end_matches('/'), uri.path());
    url.set_path(&path);
    url.set_query(uri.query());
    url.set_fragment(None);
    url
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive"
}

/// Inbound headers minus those the outbound client sets itself
fn request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if *name == header::HOST || *name == header::CONTENT_LENGTH || is_hop_by_hop(name) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

/// Fallback handler: POST bodies are routed by model, other methods rejected
pub(crate) async fn forward(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }

    let envelope = RoutingEnvelope::parse(&body)?;

    let filter = Where::new().with_model(envelope.model.as_str());
    let worker = state.registry.first(Some(&filter)).ok_or_else(|| {
        debug!("No online worker hosts model {}", envelope.model);
        ApiError::Unavailable("No available Ollama instance for the specified model".to_string())
    })?;

    let target = target_url(worker.base_url(), &uri);
    debug!(
        "Proxying {} {} for model {} to worker {}",
        method,
        uri,
        envelope.model,
        worker.name()
    );

    let mut request = state
        .client
        .request(method, target)
        .headers(request_headers(&headers))
        .body(body);
    if let Some(timeout) = state.registry.options().proxy_timeout {
        request = request.timeout(timeout);
    }

    let upstream = request.send().await.map_err(|e| {
        warn!("Proxy request to worker {} failed: {}", worker.name(), e);
        ApiError::Internal("Error proxying request".to_string())
    })?;

    let status = upstream.status();
    metrics::counter!(
        "ollama_farm_proxy_requests_total",
        "status" => status.as_str().to_string()
    )
    .increment(1);

    let mut response = Response::builder().status(status);
    if let Some(out) = response.headers_mut() {
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop(name) {
                out.append(name.clone(), value.clone());
            }
        }
    }

    // Headers are committed once the body starts streaming, so a failure
    // past this point can only be logged
    let worker_name = worker.name().to_string();
    let stream = upstream.bytes_stream().inspect_err(move |e| {
        warn!("Error copying response body from worker {}: {}", worker_name, e);
    });

    response
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(format!("Error building response: {}", e)))
}
