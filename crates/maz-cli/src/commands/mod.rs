// Command handlers for the azm CLI

pub mod apply;
pub mod config;
pub mod count;
pub mod get;
pub mod ls;
pub mod purge;
pub mod rename;
pub mod rm;

pub use apply::ApplyCommand;
pub use config::ConfigCommand;
pub use count::CountCommand;
pub use get::GetCommand;
pub use ls::LsCommand;
pub use purge::{PurgeCommand, PurgeTarget};
pub use rename::RenameCommand;
pub use rm::RmCommand;

use crate::error::CliResult;

/// Trait for command handlers
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    /// Execute the command
    async fn execute(&self) -> CliResult<()>;
}
