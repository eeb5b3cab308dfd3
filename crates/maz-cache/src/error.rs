//! Cache-related error types

use std::path::PathBuf;

use thiserror::Error;

/// Cache operation errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// The file does not exist yet. Callers treat this as "no cache".
    #[error("Cache file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but is empty or cannot be decoded.
    #[error("Corrupt cache file {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid object type: {code}")]
    InvalidType { code: String },

    #[error("Object has no usable id, name or subscriptionId")]
    MissingIdentity,
}

impl CacheError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the "file does not exist" kind
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}

/// Re-export commonly used Result type
pub type Result<T> = std::result::Result<T, CacheError>;
