// Delete an object

use std::sync::Arc;

use maz_cache::ObjectType;

use super::Command;
use crate::{
    context::AzureContext,
    error::{CliError, CliResult},
    output::{self, OutputStyle},
};

pub struct RmCommand {
    ctx: Arc<AzureContext>,
    kind: ObjectType,
    identifier: String,
    force: bool,
}

impl RmCommand {
    pub fn new(ctx: Arc<AzureContext>, kind: ObjectType, identifier: String, force: bool) -> Self {
        Self {
            ctx,
            kind,
            identifier,
            force,
        }
    }
}

#[async_trait::async_trait]
impl Command for RmCommand {
    async fn execute(&self) -> CliResult<()> {
        let style = OutputStyle::default();
        let target = self.ctx.engine.resolve(self.kind, &self.identifier).await?;
        println!("{}", style.object_line(self.kind, &target));

        if !self.force {
            output::print_warning("Not deleted. Re-run with --force to delete this object.");
            return Ok(());
        }

        let id = target
            .str_field("id")
            .ok_or_else(|| CliError::Internal(format!("{} has no id", self.kind)))?;
        self.ctx.engine.delete_object(self.kind, id).await?;
        output::print_success(&format!("Deleted {}", self.kind));
        Ok(())
    }
}
