//! maz configuration
//!
//! Loads a single explicit `MazConfig` from `~/.maz/config.toml` layered under
//! `MAZ_*` environment variables, validates it and writes it back.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::ConfigManager;
pub use types::{ConfigManager as ConfigManagerTrait, Credentials, MazConfig};
