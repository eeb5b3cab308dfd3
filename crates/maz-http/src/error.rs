//! HTTP client error types

use serde_json::Value;
use thiserror::Error;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, HttpError>;

/// HTTP client errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network request failed
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid proxy configuration
    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(String),

    /// HTTP error status
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Response body was not JSON (or a bare count)
    #[error("Undecodable response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Token acquisition failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Retry limit exceeded
    #[error("Retry limit exceeded after {attempts} attempts: {last}")]
    RetryLimitExceeded { attempts: u32, last: String },

    /// Client build error
    #[error("Failed to build HTTP client: {0}")]
    BuildError(String),
}

impl HttpError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::RequestFailed(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            HttpError::Timeout(_) => true,
            // 5xx server errors and 429 rate limiting
            HttpError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Build an `HttpStatus` error from a response body
    pub fn status(status: u16, body: Option<&Value>) -> Self {
        let message = body.map(api_message).unwrap_or_default();
        HttpError::HttpStatus {
            status,
            message: if message.is_empty() {
                "no error details".to_string()
            } else {
                message
            },
        }
    }
}

/// Extract `<code>: <message>` from an Azure error body, preferring the first
/// entry of `error.details`
pub fn api_message(body: &Value) -> String {
    let Some(error) = body.get("error") else {
        return String::new();
    };

    let pair = |v: &Value| {
        (
            v.get("code").and_then(Value::as_str).unwrap_or_default().to_string(),
            v.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
        )
    };

    if let Some(first) = error
        .get("details")
        .and_then(Value::as_array)
        .and_then(|d| d.first())
    {
        let (code, message) = pair(first);
        if !code.is_empty() && !message.is_empty() {
            return format!("{code}: {message}");
        }
    }

    match pair(error) {
        (code, message) if code.is_empty() && message.is_empty() => String::new(),
        (code, message) => format!("{code}: {message}"),
    }
}
