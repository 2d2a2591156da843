//! Configuration for the HTTP remote client.

use reqwest::Url;
use std::env;
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Remote store configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the remote store API
    pub base_url: Url,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("OFFSYNC_REMOTE_URL").ok_or(ConfigError::MissingRemoteUrl)?;
        let base_url = Url::parse(&raw_url).map_err(|_| ConfigError::InvalidUrl(raw_url.clone()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(raw_url));
        }

        let token = lookup("OFFSYNC_REMOTE_TOKEN").filter(|t| !t.is_empty());

        let timeout_ms = match lookup("OFFSYNC_REMOTE_TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) | Err(_) => return Err(ConfigError::InvalidTimeout(raw)),
                Ok(ms) => ms,
            },
            None => DEFAULT_TIMEOUT_MS,
        };

        Ok(Self {
            base_url,
            token,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("OFFSYNC_REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid OFFSYNC_REMOTE_URL value: {0}")]
    InvalidUrl(String),

    #[error("Invalid OFFSYNC_REMOTE_TIMEOUT_MS value: {0}")]
    InvalidTimeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config =
            RemoteConfig::from_lookup(lookup(&[("OFFSYNC_REMOTE_URL", "https://sync.example.com/api")]))
                .unwrap();
        assert_eq!(config.base_url.as_str(), "https://sync.example.com/api");
        assert_eq!(config.token, None);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_token_and_timeout() {
        let config = RemoteConfig::from_lookup(lookup(&[
            ("OFFSYNC_REMOTE_URL", "http://localhost:3000"),
            ("OFFSYNC_REMOTE_TOKEN", "secret"),
            ("OFFSYNC_REMOTE_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn url_is_required() {
        assert_eq!(
            RemoteConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::MissingRemoteUrl
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            RemoteConfig::from_lookup(lookup(&[("OFFSYNC_REMOTE_URL", "not a url")])),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            RemoteConfig::from_lookup(lookup(&[("OFFSYNC_REMOTE_URL", "ftp://example.com")])),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            RemoteConfig::from_lookup(lookup(&[
                ("OFFSYNC_REMOTE_URL", "http://localhost"),
                ("OFFSYNC_REMOTE_TIMEOUT_MS", "0"),
            ])),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }
}
