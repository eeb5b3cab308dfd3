// Show one object in full

use std::sync::Arc;

use maz_cache::ObjectType;

use super::Command;
use crate::{context::AzureContext, error::CliResult};

pub struct GetCommand {
    ctx: Arc<AzureContext>,
    kind: ObjectType,
    identifier: String,
}

impl GetCommand {
    pub fn new(ctx: Arc<AzureContext>, kind: ObjectType, identifier: String) -> Self {
        Self {
            ctx,
            kind,
            identifier,
        }
    }
}

#[async_trait::async_trait]
impl Command for GetCommand {
    async fn execute(&self) -> CliResult<()> {
        let obj = self.ctx.engine.resolve(self.kind, &self.identifier).await?;
        println!("{}", serde_json::to_string_pretty(&obj)?);
        Ok(())
    }
}
