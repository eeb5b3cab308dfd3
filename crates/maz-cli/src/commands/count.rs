// Compare cached and live object counts

use std::sync::Arc;

use maz_cache::ObjectType;

use super::Command;
use crate::{context::AzureContext, error::CliResult, output::OutputStyle};

pub struct CountCommand {
    ctx: Arc<AzureContext>,
    kind: ObjectType,
    azure: bool,
}

impl CountCommand {
    pub fn new(ctx: Arc<AzureContext>, kind: ObjectType, azure: bool) -> Self {
        Self { ctx, kind, azure }
    }
}

#[async_trait::async_trait]
impl Command for CountCommand {
    async fn execute(&self) -> CliResult<()> {
        let style = OutputStyle::default();
        let local = self.ctx.engine.count_local(self.kind)?;
        println!("{}", style.key_value("local", &local.to_string()));

        if self.azure {
            let live = self.ctx.engine.count_azure(self.kind).await?;
            println!("{}", style.key_value("azure", &live.to_string()));
        }
        Ok(())
    }
}
