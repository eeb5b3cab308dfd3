// Output formatting and styling

use colored::Colorize;
use maz_cache::{
    typed::{self, RoleAssignment, RoleDefinition},
    DirectoryObject, ObjectType,
};

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl OutputStyle {
    /// Format success message
    pub fn success(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✓".green().bold(), msg)
        } else {
            format!("✓ {}", msg)
        }
    }

    /// Format error message
    pub fn error(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✗".red().bold(), msg)
        } else {
            format!("✗ {}", msg)
        }
    }

    /// Format warning message
    pub fn warning(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "⚠".yellow(), msg)
        } else {
            format!("⚠ {}", msg)
        }
    }

    /// Format info message
    pub fn info(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "ℹ".blue(), msg)
        } else {
            format!("ℹ {}", msg)
        }
    }

    /// Identifiers and other literal values
    pub fn code(&self, code: &str) -> String {
        if self.use_colors {
            code.cyan().to_string()
        } else {
            code.to_string()
        }
    }

    /// Format header
    pub fn header(&self, title: &str) -> String {
        if self.use_colors {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    /// Format a key-value pair
    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.use_colors {
            format!("  {}: {}", key.bold(), value)
        } else {
            format!("  {}: {}", key, value)
        }
    }

    /// One listing line: the identifier column first, then what a reader
    /// needs to recognize the object
    pub fn object_line(&self, kind: ObjectType, obj: &DirectoryObject) -> String {
        let columns = object_columns(kind, obj);
        let mut parts = columns.into_iter();
        let first = parts.next().unwrap_or_default();
        let rest: Vec<String> = parts.filter(|c| !c.is_empty()).collect();
        if rest.is_empty() {
            self.code(&first)
        } else {
            format!("{}  {}", self.code(&first), rest.join("  "))
        }
    }
}

fn field(obj: &DirectoryObject, key: &str) -> String {
    obj.str_field(key).unwrap_or_default().to_string()
}

fn last_segment(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}

/// Columns shown per object type
pub fn object_columns(kind: ObjectType, obj: &DirectoryObject) -> Vec<String> {
    match kind {
        ObjectType::RoleDefinition => match typed::view::<RoleDefinition>(obj) {
            Ok(def) => vec![
                def.name.clone(),
                def.properties.role_name.clone(),
                if def.is_custom() { "Custom" } else { "BuiltIn" }.to_string(),
            ],
            Err(_) => vec![obj.identity().unwrap_or_default()],
        },
        ObjectType::RoleAssignment => match typed::view::<RoleAssignment>(obj) {
            Ok(asg) => vec![
                asg.name.clone(),
                last_segment(&asg.properties.role_definition_id),
                asg.properties.principal_id.clone(),
                asg.properties.principal_type.clone().unwrap_or_default(),
                asg.properties.scope.clone(),
            ],
            Err(_) => vec![obj.identity().unwrap_or_default()],
        },
        ObjectType::Subscription => vec![
            field(obj, "subscriptionId"),
            field(obj, "state"),
            field(obj, "displayName"),
        ],
        ObjectType::ManagementGroup => vec![field(obj, "name"), field(obj, "displayName")],
        ObjectType::User => vec![
            field(obj, "id"),
            field(obj, "userPrincipalName"),
            field(obj, "displayName"),
        ],
        ObjectType::Application | ObjectType::ServicePrincipal => vec![
            field(obj, "id"),
            field(obj, "appId"),
            field(obj, "displayName"),
        ],
        ObjectType::DirRoleAssignment => vec![
            field(obj, "id"),
            field(obj, "principalId"),
            field(obj, "roleDefinitionId"),
            field(obj, "directoryScopeId"),
        ],
        ObjectType::Group | ObjectType::DirRoleDefinition => {
            vec![field(obj, "id"), field(obj, "displayName")]
        }
    }
}

/// Print formatted output
pub fn print_success(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.success(msg));
}

pub fn print_error(msg: &str) {
    let style = OutputStyle {
        use_colors: atty::is(atty::Stream::Stderr),
    };
    eprintln!("{}", style.error(msg));
}

pub fn print_warning(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.warning(msg));
}

pub fn print_info(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.info(msg));
}
