// Show the effective configuration

use std::path::PathBuf;

use maz_config::MazConfig;

use super::Command;
use crate::{error::CliResult, output::OutputStyle};

pub struct ConfigCommand {
    config: MazConfig,
    config_path: PathBuf,
}

impl ConfigCommand {
    pub fn new(config: MazConfig, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Configuration as TOML with secrets and tokens masked
    pub fn render(&self) -> CliResult<String> {
        toml::to_string(&self.config.redacted())
            .map_err(|e| crate::error::CliError::Internal(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Command for ConfigCommand {
    async fn execute(&self) -> CliResult<()> {
        let style = OutputStyle::default();
        println!("{}", style.header("maz configuration"));
        println!();
        print!("{}", self.render()?);
        println!();
        println!(
            "{}",
            style.info(&format!("Config file: {}", self.config_path.display()))
        );
        Ok(())
    }
}
