// Create or update an object from a JSON file

use std::{path::PathBuf, sync::Arc};

use maz_cache::{DirectoryObject, ObjectType};

use super::Command;
use crate::{
    context::AzureContext,
    error::{CliError, CliResult},
    output,
};

pub struct ApplyCommand {
    ctx: Arc<AzureContext>,
    kind: ObjectType,
    file: PathBuf,
}

impl ApplyCommand {
    pub fn new(ctx: Arc<AzureContext>, kind: ObjectType, file: PathBuf) -> Self {
        Self { ctx, kind, file }
    }
}

/// Parse a definition file; it must hold a single JSON object
pub fn read_definition(text: &str) -> CliResult<DirectoryObject> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    DirectoryObject::from_value(value)
        .ok_or_else(|| CliError::invalid_argument("definition file must contain a JSON object"))
}

#[async_trait::async_trait]
impl Command for ApplyCommand {
    async fn execute(&self) -> CliResult<()> {
        let text = tokio::fs::read_to_string(&self.file).await?;
        let obj = read_definition(&text)?;

        let stored = self.ctx.engine.upsert_object(self.kind, obj).await?;
        let label = stored
            .display_name()
            .map(str::to_string)
            .or_else(|| stored.identity())
            .unwrap_or_default();
        output::print_success(&format!("Applied {} '{}'", self.kind, label));
        Ok(())
    }
}
