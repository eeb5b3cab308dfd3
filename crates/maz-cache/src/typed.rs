//! Typed views over cached resource objects
//!
//! The cache itself stays field-bag shaped; these structs are read out of a
//! [`DirectoryObject`] when a caller knows what family it is holding.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{object::DirectoryObject, CacheError, Result};

/// Deserialize a typed view from a generic object
pub fn view<T: DeserializeOwned>(obj: &DirectoryObject) -> Result<T> {
    serde_json::from_value(obj.clone().into_value()).map_err(|e| CacheError::Serialization {
        message: e.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub not_actions: Vec<String>,
    #[serde(default)]
    pub data_actions: Vec<String>,
    #[serde(default)]
    pub not_data_actions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinitionProperties {
    #[serde(default)]
    pub role_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub role_type: Option<String>,
    #[serde(default)]
    pub assignable_scopes: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: RoleDefinitionProperties,
}

impl RoleDefinition {
    pub fn is_custom(&self) -> bool {
        self.properties.role_type.as_deref() == Some("CustomRole")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentProperties {
    #[serde(default)]
    pub role_definition_id: String,
    #[serde(default)]
    pub principal_id: String,
    #[serde(default)]
    pub principal_type: Option<String>,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: RoleAssignmentProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl Subscription {
    /// RBAC scope string for this subscription
    pub fn scope(&self) -> String {
        format!("/subscriptions/{}", self.subscription_id)
    }

    pub fn is_enabled(&self) -> bool {
        self.state.as_deref().map_or(true, |s| s.eq_ignore_ascii_case("Enabled"))
    }
}

/// Management group as trimmed for the cache (`displayName`/`tenantId` lifted)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}
