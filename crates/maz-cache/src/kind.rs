//! Object-type registry
//!
//! Every cached object family has a short code used on the command line, a cache
//! file suffix, the REST endpoint it is listed from and the allow-list of fields
//! its cache keeps.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::CacheError;

/// Which REST API an object family lives behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiFamily {
    /// Microsoft Graph (directory objects)
    Graph,
    /// Azure Resource Manager (RBAC and resource hierarchy)
    Arm,
}

/// One field the cache keeps for a given type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Copy a top-level field as-is
    Keep(&'static str),
    /// Keep only the listed children of a nested `properties`-style map
    Nested(&'static str, &'static [&'static str]),
    /// Copy `parent.child` to the top level as `child`
    Lift(&'static str, &'static str),
}

use FieldRule::{Keep, Lift, Nested};

/// Cached Azure object families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    RoleDefinition,
    RoleAssignment,
    Subscription,
    ManagementGroup,
    User,
    Group,
    Application,
    ServicePrincipal,
    DirRoleDefinition,
    DirRoleAssignment,
}

impl ObjectType {
    pub const ALL: [ObjectType; 10] = [
        ObjectType::RoleDefinition,
        ObjectType::RoleAssignment,
        ObjectType::Subscription,
        ObjectType::ManagementGroup,
        ObjectType::User,
        ObjectType::Group,
        ObjectType::Application,
        ObjectType::ServicePrincipal,
        ObjectType::DirRoleDefinition,
        ObjectType::DirRoleAssignment,
    ];

    /// Short command-line code
    pub fn code(self) -> &'static str {
        match self {
            ObjectType::RoleDefinition => "d",
            ObjectType::RoleAssignment => "a",
            ObjectType::Subscription => "s",
            ObjectType::ManagementGroup => "m",
            ObjectType::User => "u",
            ObjectType::Group => "g",
            ObjectType::Application => "ap",
            ObjectType::ServicePrincipal => "sp",
            ObjectType::DirRoleDefinition => "dr",
            ObjectType::DirRoleAssignment => "da",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ObjectType::RoleDefinition => "resource role definition",
            ObjectType::RoleAssignment => "resource role assignment",
            ObjectType::Subscription => "subscription",
            ObjectType::ManagementGroup => "management group",
            ObjectType::User => "user",
            ObjectType::Group => "group",
            ObjectType::Application => "application",
            ObjectType::ServicePrincipal => "service principal",
            ObjectType::DirRoleDefinition => "directory role definition",
            ObjectType::DirRoleAssignment => "directory role assignment",
        }
    }

    pub fn family(self) -> ApiFamily {
        match self {
            ObjectType::RoleDefinition
            | ObjectType::RoleAssignment
            | ObjectType::Subscription
            | ObjectType::ManagementGroup => ApiFamily::Arm,
            _ => ApiFamily::Graph,
        }
    }

    /// Suffix appended to the tenant id to form cache file names
    pub fn cache_suffix(self) -> &'static str {
        match self {
            ObjectType::RoleDefinition => "_res-role-defs",
            ObjectType::RoleAssignment => "_res-role-asgns",
            ObjectType::Subscription => "_res-subs",
            ObjectType::ManagementGroup => "_res-mgmt-groups",
            ObjectType::User => "_dir-users",
            ObjectType::Group => "_dir-groups",
            ObjectType::Application => "_dir-apps",
            ObjectType::ServicePrincipal => "_dir-sps",
            ObjectType::DirRoleDefinition => "_dir-role-defs",
            ObjectType::DirRoleAssignment => "_dir-role-asgns",
        }
    }

    /// Path of the list endpoint, relative to the API family's base URL
    pub fn endpoint(self) -> &'static str {
        match self {
            ObjectType::RoleDefinition => "/providers/Microsoft.Authorization/roleDefinitions",
            ObjectType::RoleAssignment => "/providers/Microsoft.Authorization/roleAssignments",
            ObjectType::Subscription => "/subscriptions",
            ObjectType::ManagementGroup => "/providers/Microsoft.Management/managementGroups",
            ObjectType::User => "/v1.0/users",
            ObjectType::Group => "/v1.0/groups",
            ObjectType::Application => "/v1.0/applications",
            ObjectType::ServicePrincipal => "/v1.0/servicePrincipals",
            ObjectType::DirRoleDefinition => "/v1.0/roleManagement/directory/roleDefinitions",
            ObjectType::DirRoleAssignment => "/v1.0/roleManagement/directory/roleAssignments",
        }
    }

    /// ARM `api-version` query value; `None` for Graph types
    pub fn api_version(self) -> Option<&'static str> {
        match self {
            ObjectType::RoleDefinition | ObjectType::RoleAssignment => Some("2022-04-01"),
            ObjectType::Subscription => Some("2022-12-01"),
            ObjectType::ManagementGroup => Some("2023-04-01"),
            _ => None,
        }
    }

    /// Default refresh interval. Directory data changes faster and is cheaper to requery.
    pub fn default_ttl(self) -> Duration {
        match self.family() {
            ApiFamily::Graph => Duration::from_secs(1800),
            ApiFamily::Arm => Duration::from_secs(86_400),
        }
    }

    /// Whether the Graph change-tracking (`/delta`) query is available
    pub fn supports_delta(self) -> bool {
        matches!(self, ObjectType::User | ObjectType::Group)
    }

    /// Role definitions and assignments are listed once per RBAC scope
    pub fn is_scoped(self) -> bool {
        matches!(self, ObjectType::RoleDefinition | ObjectType::RoleAssignment)
    }

    /// `$select` list used when listing Graph objects
    pub fn select_fields(self) -> Option<&'static str> {
        match self {
            ObjectType::User => Some("id,displayName,userPrincipalName,onPremisesSamAccountName"),
            ObjectType::Group => {
                Some("id,displayName,description,isAssignableToRole,createdDateTime")
            }
            ObjectType::Application => {
                Some("id,displayName,appId,requiredResourceAccess,passwordCredentials")
            }
            ObjectType::ServicePrincipal => Some(
                "id,displayName,appId,accountEnabled,appOwnerOrganizationId,passwordCredentials",
            ),
            ObjectType::DirRoleDefinition => {
                Some("id,displayName,description,isBuiltIn,isEnabled,templateId")
            }
            ObjectType::DirRoleAssignment => {
                Some("id,directoryScopeId,principalId,roleDefinitionId")
            }
            _ => None,
        }
    }

    /// Graph list endpoints accept `$top=999` except the directory role ones
    pub fn supports_top(self) -> bool {
        self.family() == ApiFamily::Graph
            && !matches!(
                self,
                ObjectType::DirRoleDefinition | ObjectType::DirRoleAssignment
            )
    }

    /// Fields the cache retains for this type
    pub fn cache_fields(self) -> &'static [FieldRule] {
        match self {
            ObjectType::RoleDefinition => &[
                Keep("id"),
                Keep("name"),
                Nested(
                    "properties",
                    &["assignableScopes", "description", "permissions", "roleName", "type"],
                ),
            ],
            ObjectType::RoleAssignment => &[
                Keep("id"),
                Keep("name"),
                Nested(
                    "properties",
                    &[
                        "roleDefinitionId",
                        "description",
                        "principalId",
                        "principalType",
                        "scope",
                    ],
                ),
            ],
            ObjectType::Subscription => &[
                Keep("id"),
                Keep("subscriptionId"),
                Keep("displayName"),
                Keep("state"),
            ],
            ObjectType::ManagementGroup => &[
                Keep("id"),
                Keep("name"),
                Lift("properties", "displayName"),
                Lift("properties", "tenantId"),
            ],
            ObjectType::User => &[
                Keep("id"),
                Keep("displayName"),
                Keep("userPrincipalName"),
                Keep("onPremisesSamAccountName"),
            ],
            ObjectType::Group => &[
                Keep("id"),
                Keep("displayName"),
                Keep("description"),
                Keep("createdDateTime"),
                Keep("isAssignableToRole"),
            ],
            ObjectType::Application => &[Keep("id"), Keep("displayName"), Keep("appId")],
            ObjectType::ServicePrincipal => &[
                Keep("id"),
                Keep("displayName"),
                Keep("appId"),
                Keep("appOwnerOrganizationId"),
            ],
            ObjectType::DirRoleDefinition => &[
                Keep("id"),
                Keep("displayName"),
                Keep("description"),
                Keep("isBuiltIn"),
                Keep("isEnabled"),
                Keep("templateId"),
            ],
            ObjectType::DirRoleAssignment => &[
                Keep("id"),
                Keep("directoryScopeId"),
                Keep("principalId"),
                Keep("roleDefinitionId"),
            ],
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ObjectType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        ObjectType::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(CacheError::InvalidType { code })
    }
}
