// List cached objects of one type

use std::sync::Arc;

use maz_cache::{DirectoryObjectList, ObjectType};

use super::Command;
use crate::{
    context::AzureContext,
    error::CliResult,
    output::{self, OutputStyle},
};

pub struct LsCommand {
    ctx: Arc<AzureContext>,
    kind: ObjectType,
    filter: String,
    force: bool,
    json: bool,
}

impl LsCommand {
    pub fn new(
        ctx: Arc<AzureContext>,
        kind: ObjectType,
        filter: Option<String>,
        force: bool,
        json: bool,
    ) -> Self {
        Self {
            ctx,
            kind,
            filter: filter.unwrap_or_default(),
            force,
            json,
        }
    }
}

/// Listing text, one object per line in display-name order, or a JSON array
pub fn render_listing(
    kind: ObjectType,
    objects: &DirectoryObjectList,
    json: bool,
    style: &OutputStyle,
) -> CliResult<String> {
    if json {
        return Ok(serde_json::to_string_pretty(objects.as_slice())?);
    }

    let mut sorted: Vec<_> = objects.iter().collect();
    sorted.sort_by_key(|obj| obj.display_name().unwrap_or_default().to_lowercase());
    Ok(sorted
        .into_iter()
        .map(|obj| style.object_line(kind, obj))
        .collect::<Vec<_>>()
        .join("\n"))
}

#[async_trait::async_trait]
impl Command for LsCommand {
    async fn execute(&self) -> CliResult<()> {
        let objects = self
            .ctx
            .engine
            .get_matching(self.kind, &self.filter, self.force)
            .await?;

        if objects.is_empty() && !self.json {
            let notice = if self.filter.is_empty() {
                format!("No {} objects found", self.kind)
            } else {
                format!("No {} matches '{}'", self.kind, self.filter)
            };
            output::print_info(&notice);
            return Ok(());
        }

        let rendered = render_listing(self.kind, &objects, self.json, &OutputStyle::default())?;
        if !rendered.is_empty() {
            println!("{}", rendered);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use maz_cache::DirectoryObject;
    use serde_json::json;

    use super::*;

    fn groups() -> DirectoryObjectList {
        [
            json!({"id": "g2", "displayName": "zeta"}),
            json!({"id": "g1", "displayName": "Alpha"}),
        ]
        .into_iter()
        .filter_map(DirectoryObject::from_value)
        .collect()
    }

    #[test]
    fn test_lines_sorted_by_name() {
        let style = OutputStyle { use_colors: false };
        let text = render_listing(ObjectType::Group, &groups(), false, &style).unwrap();
        assert_eq!(text, "g1  Alpha\ng2  zeta");
    }

    #[test]
    fn test_json_listing() {
        let style = OutputStyle { use_colors: false };
        let text = render_listing(ObjectType::Group, &groups(), true, &style).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["id"], "g2");
    }

    #[test]
    fn test_empty_listing() {
        let style = OutputStyle { use_colors: false };
        let text = render_listing(ObjectType::User, &DirectoryObjectList::new(), false, &style).unwrap();
        assert!(text.is_empty());
    }
}
