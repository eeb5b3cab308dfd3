// Remove local cache files

use std::str::FromStr;

use maz_cache::{Cache, ObjectType, TenantContext};

use super::Command;
use crate::{
    error::{CliError, CliResult},
    output,
};

/// One type or every type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeTarget {
    All,
    Kind(ObjectType),
}

impl PurgeTarget {
    pub fn kinds(&self) -> Vec<ObjectType> {
        match self {
            PurgeTarget::All => ObjectType::ALL.to_vec(),
            PurgeTarget::Kind(kind) => vec![*kind],
        }
    }
}

impl FromStr for PurgeTarget {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(PurgeTarget::All);
        }
        ObjectType::from_str(s)
            .map(PurgeTarget::Kind)
            .map_err(|e| CliError::invalid_argument(e.to_string()))
    }
}

pub struct PurgeCommand {
    tenant: TenantContext,
    target: PurgeTarget,
}

impl PurgeCommand {
    pub fn new(tenant: TenantContext, target: PurgeTarget) -> Self {
        Self { tenant, target }
    }

    /// Drop the files of every targeted cache; returns how many were purged
    pub fn purge(&self) -> CliResult<usize> {
        let kinds = self.target.kinds();
        for kind in &kinds {
            Cache::purge_files(*kind, &self.tenant)?;
            tracing::debug!(kind = %kind, "cache purged");
        }
        Ok(kinds.len())
    }
}

#[async_trait::async_trait]
impl Command for PurgeCommand {
    async fn execute(&self) -> CliResult<()> {
        let purged = self.purge()?;
        output::print_success(&format!("Purged {} cache(s)", purged));
        Ok(())
    }
}
