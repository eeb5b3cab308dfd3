// Command routing and dispatch

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use maz_cache::ObjectType;
use maz_config::ConfigManager;

use crate::{
    commands::*,
    context::{self, AzureContext},
    error::CliResult,
};

const TYPE_HELP: &str = "Object type: d (resource role definitions), a (resource role assignments), \
s (subscriptions), m (management groups), u (users), g (groups), ap (applications), \
sp (service principals), dr (directory role definitions), da (directory role assignments)";

/// azm - browse and manage Azure directory and RBAC objects from a local cache
#[derive(Parser, Debug)]
#[command(name = "azm")]
#[command(bin_name = "azm")]
#[command(about = "Browse and manage Azure directory and RBAC objects")]
#[command(
    long_about = "azm keeps a local, delta-synced cache of Microsoft Graph and Azure Resource Manager objects.\n\nListings are served from the cache and refreshed when stale; when Azure is unreachable the cached data is used.\n\nCredentials come from ~/.maz/config.toml or MAZ_* environment variables."
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimize output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List objects whose fields contain a filter string
    Ls {
        #[arg(value_name = "TYPE", help = TYPE_HELP)]
        kind: ObjectType,

        /// Case-insensitive substring; a UUID is looked up directly
        #[arg(value_name = "FILTER")]
        filter: Option<String>,

        /// Refresh from Azure even if the cache is fresh
        #[arg(short, long)]
        force: bool,

        /// Print a JSON array instead of one line per object
        #[arg(long)]
        json: bool,
    },

    /// Show one object by id or exact display name
    Get {
        #[arg(value_name = "TYPE", help = TYPE_HELP)]
        kind: ObjectType,

        #[arg(value_name = "ID_OR_NAME")]
        identifier: String,
    },

    /// Count cached objects, and optionally live ones
    Count {
        #[arg(value_name = "TYPE", help = TYPE_HELP)]
        kind: ObjectType,

        /// Also count the objects in Azure
        #[arg(long)]
        azure: bool,
    },

    /// Create or update an object from a JSON definition file
    Apply {
        #[arg(value_name = "TYPE", help = TYPE_HELP)]
        kind: ObjectType,

        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Change an object's display name
    Rename {
        #[arg(value_name = "TYPE", help = TYPE_HELP)]
        kind: ObjectType,

        #[arg(value_name = "ID_OR_NAME")]
        identifier: String,

        #[arg(value_name = "NEW_NAME")]
        new_name: String,
    },

    /// Delete an object
    Rm {
        #[arg(value_name = "TYPE", help = TYPE_HELP)]
        kind: ObjectType,

        #[arg(value_name = "ID_OR_NAME")]
        identifier: String,

        /// Actually delete; without it the target is only shown
        #[arg(short, long)]
        force: bool,
    },

    /// Remove local cache files for one type or all
    Purge {
        #[arg(value_name = "TYPE|all")]
        target: PurgeTarget,
    },

    /// Show the effective configuration (secrets redacted)
    Config,
}

/// Route and execute commands
pub struct CommandRouter;

impl CommandRouter {
    /// Execute a command
    pub async fn execute(cli: &Cli) -> CliResult<()> {
        let config = context::load_config()?;

        match &cli.command {
            Commands::Config => {
                let path = ConfigManager::new().config_path().to_path_buf();
                return ConfigCommand::new(config, path).execute().await;
            }
            Commands::Purge { target } => {
                let tenant = context::tenant_context(&config)?;
                return PurgeCommand::new(tenant, *target).execute().await;
            }
            _ => {}
        }

        let ctx = Arc::new(AzureContext::connect(config)?);
        Self::dispatch(ctx, &cli.command).await
    }

    /// Run a command that talks to Azure
    pub async fn dispatch(ctx: Arc<AzureContext>, command: &Commands) -> CliResult<()> {
        let cmd: Box<dyn Command> = match command.clone() {
            Commands::Ls {
                kind,
                filter,
                force,
                json,
            } => Box::new(LsCommand::new(ctx, kind, filter, force, json)),
            Commands::Get { kind, identifier } => Box::new(GetCommand::new(ctx, kind, identifier)),
            Commands::Count { kind, azure } => Box::new(CountCommand::new(ctx, kind, azure)),
            Commands::Apply { kind, file } => Box::new(ApplyCommand::new(ctx, kind, file)),
            Commands::Rename {
                kind,
                identifier,
                new_name,
            } => Box::new(RenameCommand::new(ctx, kind, identifier, new_name)),
            Commands::Rm {
                kind,
                identifier,
                force,
            } => Box::new(RmCommand::new(ctx, kind, identifier, force)),
            Commands::Purge { target } => {
                Box::new(PurgeCommand::new(ctx.engine.tenant().clone(), target))
            }
            Commands::Config => {
                let path = ConfigManager::new().config_path().to_path_buf();
                Box::new(ConfigCommand::new(ctx.config.clone(), path))
            }
        };
        cmd.execute().await
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ls() {
        let cli = Cli::try_parse_from(["azm", "ls", "g", "ops", "--force", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Ls {
                kind,
                filter,
                force,
                json,
            } => {
                assert_eq!(kind, ObjectType::Group);
                assert_eq!(filter.as_deref(), Some("ops"));
                assert!(force);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(Cli::try_parse_from(["azm", "ls", "zz"]).is_err());
    }

    #[test]
    fn test_parse_purge_all() {
        let cli = Cli::try_parse_from(["azm", "purge", "all"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Purge {
                target: PurgeTarget::All
            }
        ));
    }

    #[test]
    fn test_parse_rm_defaults_to_dry_run() {
        let cli = Cli::try_parse_from(["azm", "rm", "a", "/subscriptions/s1/x"]).unwrap();
        assert!(matches!(cli.command, Commands::Rm { force: false, .. }));
    }

    #[test]
    fn test_parse_rename() {
        let cli = Cli::try_parse_from(["azm", "-q", "rename", "ap", "Billing", "Billing v2"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Rename { kind: ObjectType::Application, .. }
        ));
    }
}
