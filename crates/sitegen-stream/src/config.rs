use std::time::Duration;

use crate::errors::BuildError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_ENDPOINT: &str = "/page_builder";
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Configuration for the build client.
#[derive(Clone, Debug)]
pub struct BuildClientConfig {
    /// Backend origin, for example `http://localhost:8000`.
    pub base_url: String,
    /// Path of the build endpoint.
    pub endpoint: String,
    /// Whole-request timeout, streaming included. Generation is slow, so
    /// this defaults to ten minutes.
    pub timeout: Duration,
}

impl Default for BuildClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl BuildClientConfig {
    /// Builds a config from `SITEGEN_BASE_URL`, `SITEGEN_ENDPOINT` and
    /// `SITEGEN_TIMEOUT_SECS`, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, BuildError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BuildError> {
        let mut config = Self::default();
        if let Some(base_url) = lookup("SITEGEN_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url.trim().to_string();
        }
        if let Some(endpoint) = lookup("SITEGEN_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            config.endpoint = endpoint.trim().to_string();
        }
        if let Some(raw) = lookup("SITEGEN_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                BuildError::Config(format!("SITEGEN_TIMEOUT_SECS is not a number: {raw:?}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Overrides the backend origin.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the build endpoint path.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn build_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = BuildClientConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config.build_url(), "http://localhost:8000/page_builder");
        assert_eq!(config.timeout, Duration::from_secs(600));
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = BuildClientConfig::from_lookup(lookup(&[
            ("SITEGEN_BASE_URL", "https://builder.example.com/"),
            ("SITEGEN_ENDPOINT", "api/build"),
            ("SITEGEN_TIMEOUT_SECS", " 45 "),
        ]))
        .expect("config");
        assert_eq!(config.build_url(), "https://builder.example.com/api/build");
        assert_eq!(config.timeout, Duration::from_secs(45));
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let err = BuildClientConfig::from_lookup(lookup(&[("SITEGEN_TIMEOUT_SECS", "soon")]))
            .expect_err("bad timeout");
        assert!(matches!(err, BuildError::Config(msg) if msg.contains("SITEGEN_TIMEOUT_SECS")));
    }
}
