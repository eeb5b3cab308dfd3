//! # maz cache
//!
//! Local mirror of Azure directory (Microsoft Graph) and RBAC (Resource Manager)
//! objects, one file per object type and tenant.
//!
//! ## Features
//!
//! - **Field-bag objects**: recursive merge, free-text search, per-type trimming
//! - **Crash-safe files**: temp-file-then-rename writes with rename backoff
//! - **Compact storage**: CBOR encoding with optional gzip
//! - **Delta bookkeeping**: continuation tokens with a validity window
//! - **Resumable syncs**: checkpoint files merged on the next run

pub mod cache;
pub mod error;
pub mod kind;
pub mod object;
pub mod storage;
pub mod strategy;
pub mod typed;

pub use cache::{Cache, CachePaths, NormalizeReport, TenantContext, DELTA_LINK_MAX_AGE};
pub use error::{CacheError, Result};
pub use kind::{ApiFamily, FieldRule, ObjectType};
pub use object::{DirectoryObject, DirectoryObjectList};
pub use strategy::{Freshness, TtlStrategy};
