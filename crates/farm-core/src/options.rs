//! Registry options and their defaults

use reqwest::Client;
use std::time::Duration;

/// Default interval between liveness checks
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(5);

/// Default interval between model catalog refreshes
pub const DEFAULT_MODELS_TTL: Duration = Duration::from_secs(30);

/// Upper bound for a single liveness check
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for a single catalog refresh
pub const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for a [`Registry`](crate::Registry).
///
/// Every field is optional. Unset (or zero) durations fall back to the
/// documented defaults when the registry is built; the result is fixed for
/// the registry's lifetime.
#[derive(Clone, Debug, Default)]
pub struct RegistryOptions {
    /// HTTP client shared by worker clients and the proxy. Default: a fresh client
    pub client: Option<Client>,
    /// Interval for online/offline detection. Default: 5 seconds
    pub heartbeat: Option<Duration>,
    /// Interval for refreshing each worker's model catalog. Default: 30 seconds
    pub models_ttl: Option<Duration>,
    /// Upper bound for proxied requests. Default: unbounded
    pub proxy_timeout: Option<Duration>,
}

impl RegistryOptions {
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn with_models_ttl(mut self, models_ttl: Duration) -> Self {
        self.models_ttl = Some(models_ttl);
        self
    }

    pub fn with_proxy_timeout(mut self, proxy_timeout: Duration) -> Self {
        self.proxy_timeout = Some(proxy_timeout);
        self
    }

    /// Apply defaults to every unset field
    pub fn resolve(self) -> ResolvedOptions {
        ResolvedOptions {
            client: self.client.unwrap_or_default(),
            heartbeat: non_zero_or(self.heartbeat, DEFAULT_HEARTBEAT),
            models_ttl: non_zero_or(self.models_ttl, DEFAULT_MODELS_TTL),
            proxy_timeout: self.proxy_timeout.filter(|d| !d.is_zero()),
        }
    }
}

fn non_zero_or(value: Option<Duration>, default: Duration) -> Duration {
    value.filter(|d| !d.is_zero()).unwrap_or(default)
}

/// Registry options with defaults applied
#[derive(Clone, Debug)]
pub struct ResolvedOptions {
    pub client: Client,
    pub heartbeat: Duration,
    pub models_ttl: Duration,
    pub proxy_timeout: Option<Duration>,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        RegistryOptions::default().resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let resolved = RegistryOptions::default().resolve();
        assert_eq!(resolved.heartbeat, Duration::from_secs(5));
        assert_eq!(resolved.models_ttl, Duration::from_secs(30));
        assert!(resolved.proxy_timeout.is_none());
    }

    #[test]
    fn test_overrides() {
        let resolved = RegistryOptions::default()
            .with_heartbeat(Duration::from_secs(1))
            .with_models_ttl(Duration::from_secs(2))
            .with_proxy_timeout(Duration::from_secs(60))
            .resolve();
        assert_eq!(resolved.heartbeat, Duration::from_secs(1));
        assert_eq!(resolved.models_ttl, Duration::from_secs(2));
        assert_eq!(resolved.proxy_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_durations_fall_back() {
        let resolved = RegistryOptions {
            heartbeat: Some(Duration::ZERO),
            models_ttl: Some(Duration::ZERO),
            proxy_timeout: Some(Duration::ZERO),
            ..Default::default()
        }
        .resolve();
        assert_eq!(resolved.heartbeat, DEFAULT_HEARTBEAT);
        assert_eq!(resolved.models_ttl, DEFAULT_MODELS_TTL);
        assert!(resolved.proxy_timeout.is_none());
    }
}
