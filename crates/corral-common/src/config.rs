//! Connection settings for the orchestration API client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CorralError, Result};

/// Settings used to reach the orchestration API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `http://localhost:8080/v1`.
    pub url: String,
    /// Access key sent as the basic-auth user.
    pub access_key: Option<String>,
    /// Secret key sent as the basic-auth password.
    pub secret_key: Option<String>,
    /// Upper bound for every individual API call.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: crate::constants::DEFAULT_API_URL.to_string(),
            access_key: None,
            secret_key: None,
            timeout: crate::constants::DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given base URL with default timeout
    /// and no credentials.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the access/secret key pair.
    #[must_use]
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Checks that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::Config`] if the URL is not http(s), the timeout
    /// is zero, or only one half of the key pair is set.
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(CorralError::Config {
                message: format!(
                    "API url must start with http:// or https://, got \"{}\"",
                    self.url
                ),
            });
        }
        if self.timeout.is_zero() {
            return Err(CorralError::Config {
                message: "API timeout must be greater than zero".into(),
            });
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(CorralError::Config {
                message: "access key and secret key must be given together".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let cfg = ClientConfig::new("http://api.local/v1/");
        assert_eq!(cfg.base_url(), "http://api.local/v1");
    }

    #[test]
    fn rejects_non_http_url() {
        let err = ClientConfig::new("ftp://x").validate().unwrap_err();
        assert!(err.to_string().contains("http://"), "got: {err}");
    }

    #[test]
    fn rejects_half_credentials() {
        let mut cfg = ClientConfig::default();
        cfg.access_key = Some("key".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let cfg = ClientConfig::default().with_timeout(Duration::ZERO);
        assert!(cfg.validate().is_err());
    }
}
