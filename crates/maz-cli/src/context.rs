// Wiring from configuration to the sync engine

use std::sync::Arc;

use maz_cache::TenantContext;
use maz_config::{ConfigManager, ConfigManagerTrait, Credentials, MazConfig};
use maz_http::{
    ApiEndpoints, ClientSecretProvider, HttpApiClient, HttpConfig, StaticTokenProvider,
    TokenProvider,
};
use maz_sync::{SyncEngine, SyncSettings, TcpProbe};
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Load the configuration file and `MAZ_*` environment overrides
pub fn load_config() -> CliResult<MazConfig> {
    let mut manager = ConfigManager::new();
    Ok(manager.load_config()?)
}

/// Where this tenant's cache files live
pub fn tenant_context(config: &MazConfig) -> CliResult<TenantContext> {
    if config.tenant_id.trim().is_empty() {
        return Err(CliError::invalid_argument(
            "no tenant configured (set MAZ_TENANT_ID)",
        ));
    }
    Ok(TenantContext::new(&config.tenant_id, &config.cache_dir).with_compress(config.compress))
}

/// Token source for the configured credentials
pub fn token_provider(config: &MazConfig) -> CliResult<Arc<dyn TokenProvider>> {
    match config.credentials() {
        Some(Credentials::Static { graph, arm }) => {
            debug!("using static tokens");
            Ok(Arc::new(StaticTokenProvider::new(graph, arm)))
        }
        Some(Credentials::ClientSecret {
            client_id,
            client_secret,
        }) => {
            debug!(client_id = %client_id, "using client credentials");
            let provider = ClientSecretProvider::new(&config.tenant_id, client_id, client_secret);
            let provider = match &config.login_url {
                Some(url) => provider.with_login_url(url),
                None => provider,
            };
            Ok(Arc::new(provider))
        }
        None => Err(CliError::invalid_argument(
            "no credentials configured (set MAZ_MG_TOKEN and MAZ_AZ_TOKEN, or MAZ_CLIENT_ID and MAZ_CLIENT_SECRET)",
        )),
    }
}

/// Client settings derived from the configuration
pub fn http_config(config: &MazConfig) -> HttpConfig {
    let http = HttpConfig::new().with_timeout(config.request_timeout());
    match &config.proxy {
        Some(proxy) => http.with_proxy(proxy),
        None => http,
    }
}

/// Everything a command that talks to Azure needs
pub struct AzureContext {
    pub config: MazConfig,
    pub engine: SyncEngine,
}

impl AzureContext {
    pub fn connect(config: MazConfig) -> CliResult<Self> {
        ConfigManager::new().validate_config(&config)?;
        let tokens = token_provider(&config)?;
        Self::with_tokens(config, tokens)
    }

    /// Build against an explicit token source
    pub fn with_tokens(config: MazConfig, tokens: Arc<dyn TokenProvider>) -> CliResult<Self> {
        let endpoints = ApiEndpoints::new(&config.graph_url, &config.arm_url);
        let http = http_config(&config);
        let client = HttpApiClient::new(http.clone(), endpoints.clone(), tokens)?;

        let settings = SyncSettings {
            directory_ttl: config.directory_ttl(),
            resource_ttl: config.resource_ttl(),
            checkpoint_interval: config.checkpoint_interval,
            retry: http.retry_config(),
            ..Default::default()
        };
        let engine = SyncEngine::new(
            Arc::new(client),
            Arc::new(TcpProbe::for_url(&config.graph_url)),
            tenant_context(&config)?,
            endpoints,
        )
        .with_settings(settings);

        Ok(Self { config, engine })
    }
}
