//! Core configuration types

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Microsoft Graph base URL
pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com";

/// Azure Resource Manager base URL
pub const DEFAULT_ARM_URL: &str = "https://management.azure.com";

const REDACTED: &str = "********";

/// Main maz configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MazConfig {
    /// Entra ID tenant
    #[serde(default)]
    pub tenant_id: String,
    /// App registration used for the client-credentials flow
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Pre-acquired Graph token
    #[serde(default)]
    pub mg_token: Option<String>,
    /// Pre-acquired ARM token
    #[serde(default)]
    pub az_token: Option<String>,
    /// Directory holding cache files
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Gzip cache files
    #[serde(default = "default_compress")]
    pub compress: bool,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
    #[serde(default = "default_arm_url")]
    pub arm_url: String,
    /// Login authority override
    #[serde(default)]
    pub login_url: Option<String>,
    /// HTTP(S) proxy for all Azure calls
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Freshness window for directory (Graph) caches
    #[serde(default = "default_directory_ttl_secs")]
    pub directory_ttl_secs: u64,
    /// Freshness window for resource (ARM) caches
    #[serde(default = "default_resource_ttl_secs")]
    pub resource_ttl_secs: u64,
    /// Entries accumulated between fetch checkpoints
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
}

/// How requests get their bearer tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Tokens supplied up front
    Static { graph: String, arm: String },
    /// Client-credentials grant
    ClientSecret { client_id: String, client_secret: String },
}

impl Default for MazConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: None,
            client_secret: None,
            mg_token: None,
            az_token: None,
            cache_dir: default_cache_dir(),
            compress: default_compress(),
            graph_url: default_graph_url(),
            arm_url: default_arm_url(),
            login_url: None,
            proxy: None,
            request_timeout_secs: default_request_timeout_secs(),
            directory_ttl_secs: default_directory_ttl_secs(),
            resource_ttl_secs: default_resource_ttl_secs(),
            checkpoint_interval: default_checkpoint_interval(),
        }
    }
}

impl MazConfig {
    /// Static tokens win over a client secret when both are present
    pub fn credentials(&self) -> Option<Credentials> {
        let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

        if let (Some(graph), Some(arm)) = (present(&self.mg_token), present(&self.az_token)) {
            return Some(Credentials::Static { graph, arm });
        }
        if let (Some(client_id), Some(client_secret)) =
            (present(&self.client_id), present(&self.client_secret))
        {
            return Some(Credentials::ClientSecret {
                client_id,
                client_secret,
            });
        }
        None
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn directory_ttl(&self) -> Duration {
        Duration::from_secs(self.directory_ttl_secs)
    }

    pub fn resource_ttl(&self) -> Duration {
        Duration::from_secs(self.resource_ttl_secs)
    }

    /// Copy safe to print: secrets and tokens masked
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());
        Self {
            client_secret: mask(&self.client_secret),
            mg_token: mask(&self.mg_token),
            az_token: mask(&self.az_token),
            ..self.clone()
        }
    }
}

/// Configuration manager trait
pub trait ConfigManager {
    /// Load configuration
    fn load_config(&mut self) -> Result<MazConfig, crate::error::ConfigError>;
    /// Save configuration
    fn save_config(&self, config: &MazConfig) -> Result<(), crate::error::ConfigError>;
    /// Validate configuration
    fn validate_config(&self, config: &MazConfig) -> Result<(), crate::error::ConfigError>;
}

/// `~/.maz`, or `./.maz` when there is no home directory
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".maz")
}

fn default_compress() -> bool {
    true
}

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

fn default_arm_url() -> String {
    DEFAULT_ARM_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_directory_ttl_secs() -> u64 {
    1800
}

fn default_resource_ttl_secs() -> u64 {
    86400
}

fn default_checkpoint_interval() -> usize {
    5000
}
