// CLI error types and user-facing messages

use maz_cache::CacheError;
use maz_config::ConfigError;
use maz_http::HttpError;
use maz_sync::SyncError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!("Invalid argument: {}\n\nRun 'azm --help' for usage information.", message)
            }
            CliError::Io(e) => format!("File operation failed: {}", e),
            CliError::Config(e) => {
                format!("Configuration error: {}\n\nRun 'azm config' to check your configuration.", e)
            }
            CliError::Cache(e) => format!(
                "Cache error: {}\n\nRun 'azm purge <type>' to rebuild a damaged cache.",
                e
            ),
            CliError::Http(e) => format!("Request failed: {}", e),
            CliError::Sync(SyncError::NotFound { kind, id }) => {
                format!("No {} matches '{}'.", kind, id)
            }
            CliError::Sync(SyncError::Ambiguous { kind, name, count }) => format!(
                "{} {} objects are named '{}'.\n\nUse the object id instead.",
                count, kind, name
            ),
            CliError::Sync(SyncError::Api { status: 401 | 403, message }) => format!(
                "Access denied: {}\n\nCheck the tokens or the client credentials in 'azm config'.",
                message
            ),
            CliError::Sync(e) => e.to_string(),
            CliError::Json(e) => format!("Invalid JSON: {}", e),
            CliError::Internal(msg) => {
                format!("Internal error: {}\n\nPlease report this issue.", msg)
            }
        }
    }

    /// Get technical details for verbose mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(e: anyhow::Error) -> Self {
        CliError::Internal(format!("{:#}", e))
    }
}

pub type CliResult<T> = Result<T, CliError>;
