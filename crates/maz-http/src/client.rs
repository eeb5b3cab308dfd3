//! Azure REST client

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    auth::{TokenAudience, TokenProvider},
    config::{ApiEndpoints, HttpConfig},
    error::{api_message, HttpError, Result},
};

/// One REST call against Graph or ARM
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub payload: Option<Value>,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            payload: None,
            params: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, payload: Value) -> Self {
        Self::new(Method::POST, url).with_payload(payload)
    }

    pub fn patch(url: impl Into<String>, payload: Value) -> Self {
        Self::new(Method::PATCH, url).with_payload(payload)
    }

    pub fn put(url: impl Into<String>, payload: Value) -> Self {
        Self::new(Method::PUT, url).with_payload(payload)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Append a query parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Status and decoded body of a call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// String field of the body
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body.as_ref()?.get(key)?.as_str()
    }

    /// The `value` array of a list response
    pub fn value_array(&self) -> Option<&Vec<Value>> {
        self.body.as_ref()?.get("value")?.as_array()
    }

    /// Azure error message carried by the body, if any
    pub fn error_message(&self) -> String {
        self.body.as_ref().map(api_message).unwrap_or_default()
    }

    /// Turn a non-2xx response into an `HttpStatus` error
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HttpError::status(self.status, self.body.as_ref()))
        }
    }
}

/// Mockable API call seam
///
/// Non-2xx responses come back as `Ok` with their status; `Err` means the
/// call itself could not be made.
#[async_trait]
pub trait ApiCaller: Send + Sync {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Production client backed by reqwest
pub struct HttpApiClient {
    inner: reqwest::Client,
    config: HttpConfig,
    endpoints: ApiEndpoints,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpApiClient {
    /// Create a new client
    pub fn new(
        config: HttpConfig,
        endpoints: ApiEndpoints,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        // Configure proxy if provided
        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| HttpError::InvalidProxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let inner = builder
            .build()
            .map_err(|e| HttpError::BuildError(e.to_string()))?;

        Ok(Self {
            inner,
            config,
            endpoints,
            tokens,
        })
    }

    /// Get configuration
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// Token family implied by the URL prefix
    pub fn audience_for(&self, url: &str) -> Option<TokenAudience> {
        if url.starts_with(&self.endpoints.graph_url) {
            Some(TokenAudience::Graph)
        } else if url.starts_with(&self.endpoints.arm_url) {
            Some(TokenAudience::ResourceManager)
        } else {
            None
        }
    }
}

#[async_trait]
impl ApiCaller for HttpApiClient {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = request
            .url
            .parse::<url::Url>()
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", request.url)))?;

        debug!("HTTP {}: {}", request.method, request.url);
        let mut builder = self.inner.request(request.method.clone(), url);

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }

        if let Some(audience) = self.audience_for(&request.url) {
            let token = self.tokens.token(audience).await?;
            builder = builder.bearer_auth(token);
            for (name, value) in self.tokens.extra_headers(audience) {
                builder = builder.header(name, value);
            }
        }

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.config.timeout)
            } else {
                HttpError::RequestFailed(e)
            }
        })?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = match decode_body(&bytes) {
            Ok(body) => body,
            // gateways answer 5xx with HTML; the status is what matters
            Err(message) if !(200..300).contains(&status) => {
                debug!("HTTP {} {} -> {}: non-JSON error body: {message}", request.method, request.url, status);
                None
            }
            Err(message) => {
                return Err(HttpError::Decode {
                    url: request.url.clone(),
                    message,
                })
            }
        };

        debug!("HTTP {} {} -> {}", request.method, request.url, status);
        Ok(ApiResponse::new(status, body))
    }
}

/// Decode a response body: empty means no body, a bare integer (as returned
/// by `$count`) becomes `{"value": n}`, anything else must be JSON.
pub fn decode_body(bytes: &[u8]) -> std::result::Result<Option<Value>, String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim().trim_start_matches('\u{feff}');
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(count) = trimmed.parse::<i64>() {
        return Ok(Some(json!({ "value": count })));
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| e.to_string())
}
