//! Ollama worker client

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::ClientError;
use crate::types::{ListResponse, ModelInfo, VersionResponse};

/// Remote operations the farm needs from a worker.
///
/// Implementations carry their own timeouts; callers may impose tighter ones.
#[async_trait]
pub trait WorkerApi: Send + Sync {
    /// List the models the worker currently hosts
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError>;

    /// Lightweight reachability probe
    async fn heartbeat(&self) -> Result<(), ClientError>;

    /// Server version string
    async fn version(&self) -> Result<String, ClientError>;
}

/// Ollama client configuration
#[derive(Clone, Debug)]
pub struct OllamaClientConfig {
    /// Base URL of the worker, e.g. `http://10.0.0.5:11434`
    pub url: Url,
    /// Per-request timeout applied to every call
    pub request_timeout: Option<Duration>,
}

impl OllamaClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// Upper bound for a single worker API call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one Ollama worker
#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaClientConfig,
    client: Client,
}

impl OllamaClient {
    /// Create a client with its own connection pool
    pub fn new(config: OllamaClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(config, client))
    }

    /// Create a client sharing an existing connection pool
    pub fn with_client(config: OllamaClientConfig, client: Client) -> Self {
        info!("Created Ollama client for {}", config.url);
        Self { config, client }
    }

    /// Base URL of the worker
    pub fn base_url(&self) -> &Url {
        &self.config.url
    }

    /// API paths are appended to the base path, so a worker mounted under
    /// a prefix keeps it.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.config.url.clone();
        let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.endpoint(path);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(timeout) = self.config.request_timeout {
            request = request.timeout(timeout);
        }
        request
    }

    /// Send a request and turn non-success statuses into errors
    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.config.request_timeout.unwrap_or_default())
            } else {
                ClientError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl WorkerApi for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let request = self.request(Method::GET, "/api/tags");
        let list: ListResponse = self.send(request).await?.json().await?;
        Ok(list.models)
    }

    async fn heartbeat(&self) -> Result<(), ClientError> {
        let request = self.request(Method::HEAD, "/");
        self.send(request).await?;
        Ok(())
    }

    async fn version(&self) -> Result<String, ClientError> {
        let request = self.request(Method::GET, "/api/version");
        let version: VersionResponse = self.send(request).await?.json().await?;
        Ok(version.version)
    }
}
