//! Sync error types

use maz_cache::{CacheError, ObjectType};
use maz_http::HttpError;
use thiserror::Error;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while talking to Azure or updating a cache
#[derive(Debug, Error)]
pub enum SyncError {
    /// Persistence failure; the in-memory mirror is not authoritative
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The call could not be made
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Azure answered with an error status
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// A page exhausted its retries; entries fetched so far were checkpointed
    #[error("Fetch aborted after {pages} pages ({fetched} entries): {source}")]
    Aborted {
        pages: usize,
        fetched: usize,
        #[source]
        source: HttpError,
    },

    #[error("No {kind} with identifier {id}")]
    NotFound { kind: ObjectType, id: String },

    #[error("Found {count} {kind} objects named '{name}'; use the id instead")]
    Ambiguous {
        kind: ObjectType,
        name: String,
        count: usize,
    },

    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        kind: ObjectType,
        operation: &'static str,
    },

    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

impl SyncError {
    /// Network-level trouble the orchestrator may log and ride out
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Aborted { source: e, .. } | SyncError::Http(e) => {
                e.is_retryable() || matches!(e, HttpError::RetryLimitExceeded { .. })
            }
            SyncError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
