//! Azure REST plumbing for maz
//!
//! One mockable seam (`ApiCaller`) over Microsoft Graph and Azure Resource
//! Manager, with bearer tokens picked by URL prefix.
//!
//! ## Features
//!
//! - **Trait-based design**: Mockable via `ApiCaller` and `TokenProvider`
//! - **Configurable**: Timeouts, retries, proxy, user-agent, base URLs
//! - **Middleware support**: Retry logic with exponential backoff
//! - **Testing support**: Easy mocking with wiremock

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;

pub use auth::{ClientSecretProvider, StaticTokenProvider, TokenAudience, TokenProvider};
pub use client::{ApiCaller, ApiRequest, ApiResponse, HttpApiClient};
pub use config::{ApiEndpoints, HttpConfig, ARM_URL, GRAPH_URL, LOGIN_URL};
pub use error::{api_message, HttpError, Result};
pub use middleware::{RetryConfig, RetryMiddleware};

/// Re-export commonly used types
pub use reqwest::Method;
