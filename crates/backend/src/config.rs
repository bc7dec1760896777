use std::fmt;
use std::time::Duration;

/// Default HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Backend endpoints and credentials loaded from environment variables.
///
/// The bearer token is a static secret shipped with the client and is
/// sent on every request. That exposure is a known weakness of the
/// hosted backend's design; the token is at least kept out of `Debug`
/// output.
#[derive(Clone)]
pub struct BackendConfig {
    /// Task API base URL (`createtask`, `getgems`).
    pub api_url: String,
    /// PostgREST base URL (`generated_images`, `user`).
    pub data_url: String,
    /// Base URL assets are served from.
    pub asset_base_url: String,
    /// Payment webhook host, e.g. `https://webhooks.example.com`.
    pub webhook_url: Option<String>,
    pub api_token: String,
    pub request_timeout: Duration,
    /// Consecutive poll errors tolerated before a poll loop fails.
    pub max_poll_errors: u32,
}

impl BackendConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                      | Default  |
    /// |------------------------------|----------|
    /// | `NYMIA_API_URL`              | required |
    /// | `NYMIA_DATA_URL`             | required |
    /// | `NYMIA_ASSET_BASE_URL`       | required |
    /// | `NYMIA_API_TOKEN`            | required |
    /// | `NYMIA_WEBHOOK_URL`          | unset    |
    /// | `NYMIA_REQUEST_TIMEOUT_SECS` | `30`     |
    /// | `NYMIA_MAX_POLL_ERRORS`      | `0`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let request_timeout_secs = parse_or(
            "NYMIA_REQUEST_TIMEOUT_SECS",
            get("NYMIA_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let max_poll_errors = parse_or("NYMIA_MAX_POLL_ERRORS", get("NYMIA_MAX_POLL_ERRORS"), 0)?;

        Ok(Self {
            api_url: base_url("NYMIA_API_URL", required("NYMIA_API_URL")?)?,
            data_url: base_url("NYMIA_DATA_URL", required("NYMIA_DATA_URL")?)?,
            asset_base_url: base_url("NYMIA_ASSET_BASE_URL", required("NYMIA_ASSET_BASE_URL")?)?,
            webhook_url: get("NYMIA_WEBHOOK_URL")
                .map(|v| base_url("NYMIA_WEBHOOK_URL", v))
                .transpose()?,
            api_token: required("NYMIA_API_TOKEN")?,
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_poll_errors,
        })
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url)
            .field("data_url", &self.data_url)
            .field("asset_base_url", &self.asset_base_url)
            .field("webhook_url", &self.webhook_url)
            .field("api_token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("max_poll_errors", &self.max_poll_errors)
            .finish()
    }
}

/// Require an http(s) scheme and strip trailing slashes.
fn base_url(var: &'static str, value: String) -> Result<String, ConfigError> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::Invalid { var, value });
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { var, value: v }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has an invalid value: '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("NYMIA_API_URL", "https://api.test/"),
        ("NYMIA_DATA_URL", "https://db.test/rest/v1"),
        ("NYMIA_ASSET_BASE_URL", "https://cdn.test"),
        ("NYMIA_API_TOKEN", "secret"),
    ];

    #[test]
    fn loads_required_values_with_defaults() {
        let config = BackendConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.api_url, "https://api.test");
        assert_eq!(config.data_url, "https://db.test/rest/v1");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_poll_errors, 0);
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn missing_token_is_reported() {
        let result = BackendConfig::from_lookup(lookup(&REQUIRED[..3]));
        assert_matches!(result, Err(ConfigError::Missing("NYMIA_API_TOKEN")));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[0] = ("NYMIA_API_URL", "   ");
        assert_matches!(
            BackendConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Missing("NYMIA_API_URL"))
        );
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("NYMIA_REQUEST_TIMEOUT_SECS", "soon"));
        assert_matches!(
            BackendConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { var: "NYMIA_REQUEST_TIMEOUT_SECS", .. })
        );
    }

    #[test]
    fn non_http_url_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("NYMIA_WEBHOOK_URL", "webhooks.test"));
        assert_matches!(
            BackendConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { var: "NYMIA_WEBHOOK_URL", .. })
        );
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = BackendConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
