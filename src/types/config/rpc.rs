use std::num::NonZeroU32;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::rpc::{RateLimitConfig, RetryConfig, RpcClientConfig};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RpcSettings {
    /// Unlimited when unset.
    #[serde(default)]
    pub requests_per_second: Option<NonZeroU32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            requests_per_second: None,
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl RpcSettings {
    pub fn client_config(&self, url: Url) -> RpcClientConfig {
        let retry = RetryConfig::new(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.initial_backoff_ms))
            .with_max_delay(Duration::from_millis(self.max_backoff_ms));

        let mut config = RpcClientConfig::new(url)
            .with_retry(retry)
            .with_probe_timeout(Duration::from_millis(self.probe_timeout_ms));
        if let Some(rps) = self.requests_per_second {
            config = config.with_rate_limit(RateLimitConfig::per_second(rps));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_from_settings() {
        let url = Url::parse("http://localhost:8545").unwrap();

        let config = RpcSettings::default().client_config(url.clone());
        assert!(config.rate_limit.is_none());
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.probe_timeout, Duration::from_secs(5));

        let settings = RpcSettings {
            requests_per_second: NonZeroU32::new(10),
            max_retries: 0,
            initial_backoff_ms: 50,
            ..Default::default()
        };
        let config = settings.client_config(url);
        assert_eq!(
            config.rate_limit.map(|r| r.requests_per_second.get()),
            Some(10)
        );
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(50));
    }
}
