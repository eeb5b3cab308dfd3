//! # maz sync
//!
//! Keeps the local object caches in step with Microsoft Graph and Azure
//! Resource Manager.
//!
//! ## Features
//!
//! - **Delta fetch**: sequential pager over `nextLink`/`deltaLink` chains with
//!   per-page retry and periodic checkpoints
//! - **Refresh orchestration**: TTL and emptiness checks, full vs delta choice,
//!   resume of interrupted runs, per-scope RBAC listing
//! - **Lookups**: by id (with `appId` fallback), by display name, exact resolve
//! - **Lifecycle**: create, update, rename and delete with cache write-through
//! - **Offline tolerance**: cached data is served when Azure is unreachable

pub mod error;
pub mod fetch;
pub mod objects;
pub mod probe;
pub mod refresh;

#[cfg(test)]
mod testing;

pub use error::{Result, SyncError};
pub use fetch::{CheckpointSink, DeltaFetcher, FetchOutcome, DEFAULT_CHECKPOINT_INTERVAL};
pub use probe::{NetworkProbe, StaticProbe, TcpProbe};
pub use refresh::{is_uuid, plan_sync, SyncEngine, SyncMode, SyncReport, SyncSettings};
