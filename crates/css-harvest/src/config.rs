//! Fetcher configuration.
//!
//! Defaults are layered with `CSS_HARVEST_*` environment variables; embedding
//! applications apply their own overrides on top.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Environment variable overriding the per-request timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "CSS_HARVEST_TIMEOUT_MS";
/// Environment variable overriding the `User-Agent` header.
pub const ENV_USER_AGENT: &str = "CSS_HARVEST_USER_AGENT";
/// Environment variable selecting the legacy cross-origin transport (`1`/`true`).
pub const ENV_LEGACY_CORS: &str = "CSS_HARVEST_LEGACY_CORS";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Cross-origin capability of the environment the fetcher runs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorsSupport {
    /// Any origin can be requested with full request customization.
    #[default]
    Full,
    /// Cross-origin requests must keep the document's scheme and are sent
    /// without custom headers or MIME overrides.
    SameProtocolOnly,
}

/// Settings used to build a [`BatchFetcher`](crate::fetch::BatchFetcher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Per-request timeout in milliseconds. `0` disables the timeout.
    pub timeout_ms: u64,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Which transport strategy to use.
    pub cors: CorsSupport,
    /// Origin of the document being harvested. Only the legacy transport
    /// needs it to tell same-origin from cross-origin requests.
    pub origin: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: format!("css-harvest/{}", env!("CARGO_PKG_VERSION")),
            cors: CorsSupport::Full,
            origin: None,
        }
    }
}

impl FetcherConfig {
    /// Defaults overridden by `CSS_HARVEST_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.timeout_ms = ms,
                Err(e) => warn!("ignoring {ENV_TIMEOUT_MS}={raw:?}: {e}"),
            }
        }

        if let Some(agent) = lookup(ENV_USER_AGENT) {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }

        if let Some(raw) = lookup(ENV_LEGACY_CORS) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.cors = CorsSupport::SameProtocolOnly,
                "0" | "false" | "no" | "" => config.cors = CorsSupport::Full,
                other => warn!("ignoring {ENV_LEGACY_CORS}={other:?}: expected a boolean"),
            }
        }

        config
    }

    /// Set the document origin used by the legacy transport.
    pub fn with_origin(mut self, origin: &Url) -> Self {
        self.origin = Some(origin.origin().ascii_serialization());
        self
    }

    /// Request timeout, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Parsed origin, if one was configured and it parses.
    pub fn origin_url(&self) -> Option<Url> {
        self.origin.as_deref().and_then(|o| Url::parse(o).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert!(config.user_agent.starts_with("css-harvest/"));
        assert_eq!(config.cors, CorsSupport::Full);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_env_overrides() {
        let config = FetcherConfig::from_lookup(lookup_from(&[
            (ENV_TIMEOUT_MS, "1500"),
            (ENV_USER_AGENT, "harvester/2"),
            (ENV_LEGACY_CORS, "true"),
        ]));
        assert_eq!(config.timeout_ms, 1500);
        assert_eq!(config.user_agent, "harvester/2");
        assert_eq!(config.cors, CorsSupport::SameProtocolOnly);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let config = FetcherConfig::from_lookup(lookup_from(&[
            (ENV_TIMEOUT_MS, "soon"),
            (ENV_LEGACY_CORS, "maybe"),
        ]));
        assert_eq!(config, FetcherConfig::default());
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = FetcherConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_origin_round_trip() {
        let page = Url::parse("https://example.com:8443/app/index.html").unwrap();
        let config = FetcherConfig::default().with_origin(&page);
        assert_eq!(config.origin.as_deref(), Some("https://example.com:8443"));
        assert_eq!(config.origin_url().unwrap().host_str(), Some("example.com"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: FetcherConfig =
            serde_json::from_str(r#"{"timeout_ms": 10, "cors": "same_protocol_only"}"#).unwrap();
        assert_eq!(config.timeout_ms, 10);
        assert_eq!(config.cors, CorsSupport::SameProtocolOnly);
        assert!(config.user_agent.starts_with("css-harvest/"));
    }
}
