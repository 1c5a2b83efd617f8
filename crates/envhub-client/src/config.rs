use std::time::Duration;

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENVHUB_URL_ENV: &str = "ENVHUB_URL";
pub const ENVHUB_TIMEOUT_SECS_ENV: &str = "ENVHUB_TIMEOUT_SECS";

/// Where the client connects and how long a single request may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server URL including the API base path, e.g. `http://localhost:8080/api/v1`.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Reads `ENVHUB_URL` and `ENVHUB_TIMEOUT_SECS`, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENVHUB_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url.trim().to_string();
        }

        if let Some(raw) = lookup(ENVHUB_TIMEOUT_SECS_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!(
                    value = %raw,
                    "Ignoring invalid {ENVHUB_TIMEOUT_SECS_ENV}, using {}s",
                    DEFAULT_TIMEOUT.as_secs()
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url, "http://localhost:8080/api/v1");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (ENVHUB_URL_ENV, "http://envhub.internal:9000/api/v1"),
            (ENVHUB_TIMEOUT_SECS_ENV, "3"),
        ]));
        assert_eq!(config.base_url, "http://envhub.internal:9000/api/v1");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_timeout_keeps_default() {
        let config = ClientConfig::from_lookup(lookup_from(&[(ENVHUB_TIMEOUT_SECS_ENV, "soon")]));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        let config = ClientConfig::from_lookup(lookup_from(&[(ENVHUB_TIMEOUT_SECS_ENV, "0")]));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
