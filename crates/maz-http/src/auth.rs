//! Bearer token acquisition for the two API families

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    config::LOGIN_URL,
    error::{HttpError, Result},
};

/// Which token a request needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenAudience {
    /// Microsoft Graph
    Graph,
    /// Azure Resource Manager
    ResourceManager,
}

impl TokenAudience {
    /// OAuth2 scope requested for this audience
    pub fn scope(&self) -> &'static str {
        match self {
            TokenAudience::Graph => "https://graph.microsoft.com/.default",
            TokenAudience::ResourceManager => "https://management.azure.com/.default",
        }
    }
}

/// Source of bearer tokens and per-audience headers
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a valid access token for `audience`
    async fn token(&self, audience: TokenAudience) -> Result<String>;

    /// Additional headers attached to every request for `audience`
    fn extra_headers(&self, _audience: TokenAudience) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Pre-acquired tokens, one per audience
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    graph: Option<String>,
    resource_manager: Option<String>,
    headers: HashMap<TokenAudience, Vec<(String, String)>>,
}

impl StaticTokenProvider {
    pub fn new(graph: impl Into<String>, resource_manager: impl Into<String>) -> Self {
        Self {
            graph: Some(graph.into()),
            resource_manager: Some(resource_manager.into()),
            headers: HashMap::new(),
        }
    }

    /// Attach a header to every request of `audience`
    pub fn with_header(
        mut self,
        audience: TokenAudience,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers
            .entry(audience)
            .or_default()
            .push((name.into(), value.into()));
        self
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, audience: TokenAudience) -> Result<String> {
        let token = match audience {
            TokenAudience::Graph => self.graph.as_ref(),
            TokenAudience::ResourceManager => self.resource_manager.as_ref(),
        };
        token
            .cloned()
            .ok_or_else(|| HttpError::Auth(format!("no token configured for {audience:?}")))
    }

    fn extra_headers(&self, audience: TokenAudience) -> Vec<(String, String)> {
        self.headers.get(&audience).cloned().unwrap_or_default()
    }
}

/// Client-credentials flow against the Entra ID token endpoint.
///
/// Tokens are cached per audience until one minute before they expire.
pub struct ClientSecretProvider {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    login_url: String,
    client: reqwest::Client,
    cache: Mutex<HashMap<TokenAudience, (String, Instant)>>,
}

impl ClientSecretProvider {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            login_url: LOGIN_URL.to_string(),
            client: reqwest::Client::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Point at a different login authority
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TokenProvider for ClientSecretProvider {
    async fn token(&self, audience: TokenAudience) -> Result<String> {
        {
            let guard = self.cache.lock().await;
            if let Some((token, expiry)) = guard.get(&audience) {
                if Instant::now() < *expiry {
                    return Ok(token.clone());
                }
            }
        }

        let url = format!("{}/{}/oauth2/v2.0/token", self.login_url, self.tenant_id);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", audience.scope()),
        ];
        debug!(audience = ?audience, "Requesting access token");

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| HttpError::Auth(format!("token decode: {e}")))?;
        if !status.is_success() {
            let reason = body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(HttpError::Auth(format!("token request returned {status}: {reason}")));
        }

        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| HttpError::Auth("no access_token in token response".to_string()))?
            .to_string();
        let expires_in = body.get("expires_in").and_then(Value::as_u64).unwrap_or(3600);
        let expiry = Instant::now() + Duration::from_secs(expires_in.saturating_sub(60));

        self.cache
            .lock()
            .await
            .insert(audience, (token.clone(), expiry));
        Ok(token)
    }
}
