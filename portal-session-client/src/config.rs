//! Session client settings.

use std::time::Duration;

use portal_session_core::SlotLayout;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::navigation::LoginDestinations;
use crate::types::ClientError;

/// Uniform request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// What to do with an `http` target when the page is served over `https`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedContentPolicy {
    /// Rewrite the target to `https`.
    #[default]
    Upgrade,
    /// Fail the request with [`ClientError::InsecureTarget`].
    Reject,
}

/// Settings for a [`SessionClient`](crate::SessionClient).
///
/// Every field has a default, so a partial TOML table is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend origin plus API prefix; relative targets are appended to it.
    pub base_url: String,

    /// Timeout applied to every request.
    pub timeout_secs: u64,

    /// Statuses meaning "the credential is no longer valid".
    pub auth_failure_statuses: Vec<u16>,

    pub mixed_content: MixedContentPolicy,

    pub destinations: LoginDestinations,

    /// Credential slots in precedence order.
    pub slots: SlotLayout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auth_failure_statuses: vec![StatusCode::UNAUTHORIZED.as_u16()],
            mixed_content: MixedContentPolicy::default(),
            destinations: LoginDestinations::default(),
            slots: SlotLayout::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sub-second remainders round up to the next whole second.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parse and check the base URL.
    pub fn parsed_base_url(&self) -> Result<Url, ClientError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("invalid base_url {:?}: {}", self.base_url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ClientError::Config(format!(
                "base_url must be http or https, got {}",
                other
            ))),
        }
    }

    /// Check every setting, returning the parsed base URL.
    pub fn validate(&self) -> Result<Url, ClientError> {
        if self.timeout_secs == 0 {
            return Err(ClientError::Config("timeout_secs must be at least 1".to_string()));
        }
        self.parsed_base_url()
    }

    pub fn is_auth_failure(&self, status: StatusCode) -> bool {
        self.auth_failure_statuses.contains(&status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.is_auth_failure(StatusCode::UNAUTHORIZED));
        assert!(!config.is_auth_failure(StatusCode::FORBIDDEN));
        assert_eq!(config.mixed_content, MixedContentPolicy::Upgrade);
        assert!(config.parsed_base_url().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"base_url": "https://api.example.com", "mixed_content": "reject", "destinations": {"client": "/portal/login"}}"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.mixed_content, MixedContentPolicy::Reject);
        assert_eq!(config.destinations.client, "/portal/login");
        assert_eq!(config.destinations.admin, "/admin/login");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let config = SessionConfig::default().with_base_url("ftp://files.example.com");
        assert!(matches!(config.parsed_base_url(), Err(ClientError::Config(_))));

        let config = SessionConfig::default().with_base_url("not a url");
        assert!(config.parsed_base_url().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = SessionConfig {
            timeout_secs: 0,
            ..SessionConfig::default()
        };
        assert!(config.parsed_base_url().is_ok());
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_with_timeout_rounds_up() {
        let config = SessionConfig::default().with_timeout(Duration::from_millis(500));
        assert_eq!(config.timeout_secs, 1);

        let config = SessionConfig::default().with_timeout(Duration::from_millis(1500));
        assert_eq!(config.timeout_secs, 2);

        let config = SessionConfig::default().with_timeout(Duration::from_secs(2));
        assert_eq!(config.timeout_secs, 2);

        let config = SessionConfig::default().with_timeout(Duration::ZERO);
        assert!(config.validate().is_ok());
    }
}
