//! Configuration loading

use anyhow::{Context, Result};
use farm_core::{Properties, RegistryOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub farm: FarmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Workers registered at startup
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<WorkerConfig>,
}

/// Server configuration
///
/// The management routes under `/farm/*` are unauthenticated; bind to a
/// private address when the farm is reachable from untrusted networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Polling and proxy tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_models_ttl_secs")]
    pub models_ttl_secs: u64,
    /// Unset means proxied requests are not time-bounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_timeout_secs: Option<u64>,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            models_ttl_secs: default_models_ttl_secs(),
            proxy_timeout_secs: None,
        }
    }
}

impl FarmConfig {
    /// Registry options for these settings; zero values keep the registry defaults
    pub fn registry_options(&self) -> RegistryOptions {
        let mut options = RegistryOptions::default()
            .with_heartbeat(Duration::from_secs(self.heartbeat_secs))
            .with_models_ttl(Duration::from_secs(self.models_ttl_secs));
        if let Some(secs) = self.proxy_timeout_secs {
            options = options.with_proxy_timeout(Duration::from_secs(secs));
        }
        options
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// A worker entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub url: String,
    /// Defaults to the worker URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub priority: i64,
    /// Start out offline until the first successful poll
    #[serde(default)]
    pub offline: bool,
}

impl WorkerConfig {
    /// Worker from a bare URL, as given on the command line
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            group: String::new(),
            priority: 0,
            offline: false,
        }
    }

    pub fn properties(&self) -> Properties {
        Properties {
            group: self.group.clone(),
            priority: self.priority,
            offline: self.offline,
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    11435
}

fn default_heartbeat_secs() -> u64 {
    5
}

fn default_models_ttl_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a file; `None` when it does not exist.
    ///
    /// Runs before logging is initialized, so the caller reports the outcome.
    pub fn load(path: &str) -> Result<Option<Self>> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(Some(config))
    }
}
