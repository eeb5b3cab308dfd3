//! HTTP client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::middleware::RetryConfig;

/// Microsoft Graph base URL
pub const GRAPH_URL: &str = "https://graph.microsoft.com";

/// Azure Resource Manager base URL
pub const ARM_URL: &str = "https://management.azure.com";

/// Entra ID login authority
pub const LOGIN_URL: &str = "https://login.microsoftonline.com";

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Connection timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Total attempts per page fetch
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Delay after the first failed attempt, doubled each time
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// HTTP/HTTPS proxy URL
    #[serde(default)]
    pub proxy: Option<String>,

    /// Custom user agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            retry_count: default_retry_count(),
            retry_delay: default_retry_delay(),
            proxy: None,
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    /// Create a new HTTP config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Set the initial retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set proxy URL
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Backoff policy for paged fetches
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_count,
            initial_delay: self.retry_delay,
            ..Default::default()
        }
    }
}

/// Base URLs of the two API families
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoints {
    pub graph_url: String,
    pub arm_url: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            graph_url: GRAPH_URL.to_string(),
            arm_url: ARM_URL.to_string(),
        }
    }
}

impl ApiEndpoints {
    pub fn new(graph_url: impl Into<String>, arm_url: impl Into<String>) -> Self {
        Self {
            graph_url: trim_slash(graph_url.into()),
            arm_url: trim_slash(arm_url.into()),
        }
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

// Default value functions for serde
fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_user_agent() -> String {
    format!("maz/{}", env!("CARGO_PKG_VERSION"))
}
