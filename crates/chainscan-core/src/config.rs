use std::time::Duration;

use bitcoin::Network;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ExplorerError;

/// Refill interval of the per-adapter request limiter.
pub const DEFAULT_RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(250);

/// Per-adapter settings, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Overrides the backend's built-in base URL (e.g. for a self-hosted
    /// mirror or a test server).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Query testnet instead of mainnet.
    #[serde(default)]
    pub testnet: bool,
    #[serde(
        rename = "rate_limit_interval_ms",
        with = "duration_ms",
        default = "default_interval"
    )]
    pub rate_limit_interval: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            testnet: false,
            rate_limit_interval: DEFAULT_RATE_LIMIT_INTERVAL,
        }
    }
}

impl BackendConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    pub fn with_rate_limit_interval(mut self, interval: Duration) -> Self {
        self.rate_limit_interval = interval;
        self
    }

    pub fn network(&self) -> Network {
        if self.testnet {
            Network::Testnet
        } else {
            Network::Bitcoin
        }
    }

    /// Resolve the base URL, falling back to `default` when no override is set.
    pub(crate) fn resolve_base_url(&self, default: &str) -> Result<Url, ExplorerError> {
        let raw = self.base_url.as_deref().unwrap_or(default);
        parse_base_url(raw)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ExplorerError> {
    let parsed = Url::parse(raw).map_err(|e| {
        ExplorerError::InvalidConfig(format!("invalid base URL `{raw}`: expected HTTP(S) URL ({e})"))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ExplorerError::InvalidConfig(format!(
            "unsupported base URL scheme `{other}`; expected http or https"
        ))),
    }
}

fn default_interval() -> Duration {
    DEFAULT_RATE_LIMIT_INTERVAL
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(value.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        u64::deserialize(de).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_mainnet_and_250ms() {
        let config = BackendConfig::default();
        assert_eq!(config.network(), Network::Bitcoin);
        assert_eq!(config.rate_limit_interval, Duration::from_millis(250));
    }

    #[test]
    fn deserializes_interval_in_milliseconds() {
        let config: BackendConfig =
            serde_json::from_value(serde_json::json!({"testnet": true, "rate_limit_interval_ms": 1000}))
                .expect("config must deserialize");
        assert!(config.testnet);
        assert_eq!(config.network(), Network::Testnet);
        assert_eq!(config.rate_limit_interval, Duration::from_secs(1));
    }

    #[test]
    fn override_wins_over_default_url() {
        let config = BackendConfig::default().with_base_url("http://127.0.0.1:9000/");
        let url = config
            .resolve_base_url("https://chain.so/")
            .expect("override must parse");
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn rejects_non_http_scheme() {
        let config = BackendConfig::default().with_base_url("ftp://example.com");
        let err = config
            .resolve_base_url("https://chain.so/")
            .expect_err("must reject ftp");
        assert!(err.to_string().contains("unsupported base URL scheme"));
    }
}
