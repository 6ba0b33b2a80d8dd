//! Kite adapter configuration.

use std::time::Duration;

use crate::infrastructure::config::{Credentials, DEFAULT_API_URL, DeskSettings};

/// Configuration for the Kite REST adapter.
#[derive(Debug, Clone)]
pub struct KiteConfig {
    /// REST root URL.
    pub base_url: String,
    /// API credentials.
    pub credentials: Credentials,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Retry policy for reads.
    pub retry: RetryConfig,
}

impl KiteConfig {
    /// Create a configuration against the production API.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            credentials,
            timeout: Duration::from_secs(7),
            retry: RetryConfig::default(),
        }
    }

    /// Build from desk settings.
    #[must_use]
    pub fn from_settings(settings: &DeskSettings) -> Self {
        Self::new(settings.credentials.clone()).with_base_url(&settings.api_url)
    }

    /// Point at another REST root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry configuration.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Retry configuration. Order placement, modification and cancellation are
/// never retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts per read.
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A single attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("key".to_string(), "token".to_string())
    }

    #[test]
    fn defaults_target_production() {
        let config = KiteConfig::new(credentials());
        assert_eq!(config.base_url, "https://api.kite.trade");
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = KiteConfig::new(credentials()).with_base_url("http://127.0.0.1:8080/");
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
    }
}
