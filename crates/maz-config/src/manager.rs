//! Configuration manager implementation

use std::{
    fs,
    io::Write,
    os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt},
    path::{Path, PathBuf},
};

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::{
    error::{ConfigError, Result},
    types::{default_cache_dir, ConfigManager as ConfigManagerTrait, MazConfig},
};

const ENV_PREFIX: &str = "MAZ";

/// Configuration manager
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Create with custom config path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        default_cache_dir().join("config.toml")
    }
}

impl ConfigManagerTrait for ConfigManager {
    fn load_config(&mut self) -> Result<MazConfig> {
        debug!("Loading configuration from {}", self.config_path.display());
        let builder = Config::builder()
            .add_source(
                File::from(self.config_path.clone())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(&self.env_prefix).try_parsing(true));

        let config = builder.build()?;
        let maz_config: MazConfig = config.try_deserialize()?;
        Ok(maz_config)
    }

    fn save_config(&self, config: &MazConfig) -> Result<()> {
        let toml = toml::to_string(config)?;
        if let Some(parent) = self.config_path.parent() {
            fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&self.config_path)?;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(toml.as_bytes())?;
        Ok(())
    }

    fn validate_config(&self, config: &MazConfig) -> Result<()> {
        if uuid::Uuid::parse_str(&config.tenant_id).is_err() {
            return Err(ConfigError::Validation(format!(
                "tenant id '{}' is not a UUID (set MAZ_TENANT_ID)",
                config.tenant_id
            )));
        }
        if config.credentials().is_none() {
            return Err(ConfigError::Validation(
                "no credentials: set MAZ_MG_TOKEN and MAZ_AZ_TOKEN, or MAZ_CLIENT_ID and MAZ_CLIENT_SECRET"
                    .to_string(),
            ));
        }
        if config.checkpoint_interval == 0 {
            return Err(ConfigError::Validation(
                "checkpoint interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
