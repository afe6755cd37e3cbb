//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend endpoints and session-expiry behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL; only requests under it are authenticated
    pub base_url: String,

    /// Token refresh endpoint, relative to the base URL
    #[serde(default = "ClientConfig::default_refresh_path")]
    pub refresh_path: String,

    /// Dashboard token endpoint, relative to the base URL
    #[serde(default = "ClientConfig::default_dashboard_token_path")]
    pub dashboard_token_path: String,

    /// Where to send the user once a standard session expires
    #[serde(default = "ClientConfig::default_redirect_path")]
    pub redirect_path: String,

    /// Delay between the expiry alert and the redirect
    #[serde(default = "ClientConfig::default_redirect_delay_ms")]
    pub redirect_delay_ms: u64,

    /// User agent sent with every request
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub const DEFAULT_REFRESH_PATH: &'static str = "/api/token/refresh/";
    pub const DEFAULT_DASHBOARD_TOKEN_PATH: &'static str = "/api/token/dashboard/";
    pub const DEFAULT_REDIRECT_PATH: &'static str = "/";
    pub const DEFAULT_REDIRECT_DELAY_MS: u64 = 2_000;

    /// Configuration with default endpoints for `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: Self::default_refresh_path(),
            dashboard_token_path: Self::default_dashboard_token_path(),
            redirect_path: Self::default_redirect_path(),
            redirect_delay_ms: Self::DEFAULT_REDIRECT_DELAY_MS,
            user_agent: None,
        }
    }

    fn default_refresh_path() -> String {
        Self::DEFAULT_REFRESH_PATH.to_string()
    }

    fn default_dashboard_token_path() -> String {
        Self::DEFAULT_DASHBOARD_TOKEN_PATH.to_string()
    }

    fn default_redirect_path() -> String {
        Self::DEFAULT_REDIRECT_PATH.to_string()
    }

    fn default_redirect_delay_ms() -> u64 {
        Self::DEFAULT_REDIRECT_DELAY_MS
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    /// Base URL without a trailing slash
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Absolute URL of a backend path
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.normalized_base_url(), path)
        } else {
            format!("{}/{}", self.normalized_base_url(), path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_partial_json() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "https://api.example.org/"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("https://api.example.org/"));
        assert_eq!(config.redirect_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let config = ClientConfig::new("https://api.example.org/");
        assert_eq!(
            config.endpoint("/api/token/refresh/"),
            "https://api.example.org/api/token/refresh/"
        );
        assert_eq!(
            config.endpoint("schools"),
            "https://api.example.org/schools"
        );
    }
}
