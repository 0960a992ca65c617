//! Client configuration

use std::time::Duration;

/// Default Admin SDK Directory API base URL
pub const DEFAULT_BASE_URL: &str = "https://admin.googleapis.com/admin/directory/v1";

/// Configuration for the Directory API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the Directory API
    pub base_url: String,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum attempts per request (first try included)
    pub retry_attempts: u32,

    /// Initial retry delay, doubled on every further attempt
    pub retry_delay: Duration,

    /// User agent string
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
            user_agent: format!("change-primary-domain/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry configuration
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Set custom user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
