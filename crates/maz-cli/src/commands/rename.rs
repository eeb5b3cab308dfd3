// Change an object's display name

use std::sync::Arc;

use maz_cache::ObjectType;

use super::Command;
use crate::{
    context::AzureContext,
    error::{CliError, CliResult},
    output,
};

pub struct RenameCommand {
    ctx: Arc<AzureContext>,
    kind: ObjectType,
    identifier: String,
    new_name: String,
}

impl RenameCommand {
    pub fn new(ctx: Arc<AzureContext>, kind: ObjectType, identifier: String, new_name: String) -> Self {
        Self {
            ctx,
            kind,
            identifier,
            new_name,
        }
    }
}

#[async_trait::async_trait]
impl Command for RenameCommand {
    async fn execute(&self) -> CliResult<()> {
        if self.new_name.trim().is_empty() {
            return Err(CliError::invalid_argument("new name must not be empty"));
        }

        let target = self.ctx.engine.resolve(self.kind, &self.identifier).await?;
        let id = target
            .str_field("id")
            .ok_or_else(|| CliError::Internal(format!("{} has no id", self.kind)))?;
        self.ctx
            .engine
            .rename_object(self.kind, id, &self.new_name)
            .await?;

        output::print_success(&format!(
            "Renamed {} '{}' to '{}'",
            self.kind,
            target.display_name().unwrap_or(id),
            self.new_name
        ));
        Ok(())
    }
}
