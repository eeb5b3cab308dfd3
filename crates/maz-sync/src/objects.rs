//! Lookups and lifecycle operations against Azure
//!
//! Every successful read or write of a single object is mirrored into its cache
//! so the next listing sees it without a refresh.

use std::collections::HashSet;

use maz_cache::{ApiFamily, DirectoryObject, DirectoryObjectList, ObjectType};
use maz_http::{ApiRequest, ApiResponse};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, SyncError},
    refresh::{is_uuid, SyncEngine},
};

/// Body of a successful response, `None` when Azure says the object is not there
fn lookup(response: ApiResponse) -> Result<Option<DirectoryObject>> {
    match response.status {
        200..=299 => Ok(response.body.and_then(DirectoryObject::from_value)),
        400 | 404 => Ok(None),
        status => Err(SyncError::Api {
            status,
            message: response.error_message(),
        }),
    }
}

/// Objects of a list response; empty when the collection is not there
fn lookup_list(response: ApiResponse) -> Result<Vec<DirectoryObject>> {
    match response.status {
        200..=299 => Ok(response
            .value_array()
            .map(|values| {
                values
                    .iter()
                    .cloned()
                    .filter_map(DirectoryObject::from_value)
                    .collect()
            })
            .unwrap_or_default()),
        400 | 404 => Ok(Vec::new()),
        status => Err(SyncError::Api {
            status,
            message: response.error_message(),
        }),
    }
}

fn success_body(response: ApiResponse) -> Result<Value> {
    if response.is_success() {
        Ok(response.body.unwrap_or(Value::Null))
    } else {
        Err(SyncError::Api {
            status: response.status,
            message: response.error_message(),
        })
    }
}

/// OData string literal quoting
fn odata_quote(value: &str) -> String {
    value.replace('\'', "''")
}

fn last_segment(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

impl SyncEngine {
    /// Fetch one object straight from Azure. Found objects are cached trimmed;
    /// the caller gets the full body.
    pub async fn get_by_id(&self, kind: ObjectType, id: &str) -> Result<Option<DirectoryObject>> {
        let found = match kind.family() {
            ApiFamily::Graph => self.graph_by_id(kind, id).await?,
            ApiFamily::Arm => self.arm_by_id(kind, id).await?,
        };
        match &found {
            Some(obj) => self.remember(kind, obj)?,
            None => debug!(kind = %kind, id, "object not found in Azure"),
        }
        Ok(found)
    }

    async fn graph_by_id(&self, kind: ObjectType, id: &str) -> Result<Option<DirectoryObject>> {
        let base = self.graph_url(kind.endpoint());
        let response = self.api.call(ApiRequest::get(format!("{base}/{id}"))).await?;
        if let Some(obj) = lookup(response)? {
            return Ok(Some(obj));
        }

        if matches!(kind, ObjectType::Application | ObjectType::ServicePrincipal) {
            let request = ApiRequest::get(base)
                .with_param("$filter", format!("appId eq '{}'", odata_quote(id)));
            let matches = lookup_list(self.api.call(request).await?)?;
            if matches.len() > 1 {
                warn!(kind = %kind, app_id = id, count = matches.len(), "several objects share this appId, using the first");
            }
            return Ok(matches.into_iter().next());
        }
        Ok(None)
    }

    async fn arm_by_id(&self, kind: ObjectType, id: &str) -> Result<Option<DirectoryObject>> {
        let version = kind.api_version().unwrap_or_default();
        let candidates: Vec<String> = if id.starts_with('/') {
            vec![id.to_string()]
        } else {
            match kind {
                ObjectType::Subscription | ObjectType::ManagementGroup => {
                    vec![format!("{}/{id}", kind.endpoint())]
                }
                ObjectType::RoleDefinition | ObjectType::RoleAssignment => {
                    let mut scopes = Vec::new();
                    // built-in definitions live at the root
                    if kind == ObjectType::RoleDefinition {
                        scopes.push(String::new());
                    }
                    for scope in self.resource_scopes().await? {
                        if !scopes.contains(&scope) {
                            scopes.push(scope);
                        }
                    }
                    scopes
                        .iter()
                        .map(|scope| format!("{scope}{}/{id}", kind.endpoint()))
                        .collect()
                }
                _ => return Ok(None),
            }
        };

        for path in candidates {
            let request = ApiRequest::get(self.arm_url(&path)).with_param("api-version", version);
            match lookup(self.api.call(request).await?) {
                Ok(Some(obj)) => return Ok(Some(obj)),
                Ok(None) => {}
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => debug!(path = %path, "lookup failed at scope: {e}"),
            }
        }
        Ok(None)
    }

    /// Objects whose display name equals `name`. Graph is queried directly;
    /// RBAC types are matched case-insensitively against the cache.
    pub async fn get_by_name(&self, kind: ObjectType, name: &str) -> Result<DirectoryObjectList> {
        if kind.family() == ApiFamily::Graph && kind != ObjectType::DirRoleAssignment {
            let request = ApiRequest::get(self.graph_url(kind.endpoint()))
                .with_param("$filter", format!("displayName eq '{}'", odata_quote(name)));
            let found = lookup_list(self.api.call(request).await?)?;
            for obj in &found {
                self.remember(kind, obj)?;
            }
            return Ok(found.into_iter().collect());
        }

        let all = self.get_matching(kind, "", false).await?;
        Ok(all
            .into_iter()
            .filter(|obj| {
                obj.display_name()
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
            .collect())
    }

    /// Exactly one object for an id or a unique display name
    pub async fn resolve(&self, kind: ObjectType, identifier: &str) -> Result<DirectoryObject> {
        let not_found = || SyncError::NotFound {
            kind,
            id: identifier.to_string(),
        };

        if is_uuid(identifier) || identifier.starts_with('/') {
            return self.get_by_id(kind, identifier).await?.ok_or_else(not_found);
        }

        let mut matches = self.get_by_name(kind, identifier).await?.into_vec();
        match matches.len() {
            // management group ids are plain names
            0 => self.get_by_id(kind, identifier).await?.ok_or_else(not_found),
            1 => Ok(matches.remove(0)),
            count => Err(SyncError::Ambiguous {
                kind,
                name: identifier.to_string(),
                count,
            }),
        }
    }

    pub fn count_local(&self, kind: ObjectType) -> Result<usize> {
        Ok(self.cache(kind)?.count())
    }

    /// Live object count in Azure
    pub async fn count_azure(&self, kind: ObjectType) -> Result<usize> {
        if kind.family() == ApiFamily::Graph {
            let request = ApiRequest::get(format!("{}/$count", self.graph_url(kind.endpoint())))
                .with_header("ConsistencyLevel", "eventual");
            let body = success_body(self.api.call(request).await?)?;
            return body
                .get("value")
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .ok_or_else(|| SyncError::InvalidObject("count response carried no number".into()));
        }

        let entries = if kind.is_scoped() {
            let scopes = self.resource_scopes().await?;
            self.fetch_across_scopes(kind, &scopes).await?.entries
        } else {
            let request = self.sync_request(kind, &crate::refresh::SyncMode::Full);
            self.fetcher().fetch(request, None).await?.entries
        };
        let unique: HashSet<String> = entries.iter().filter_map(|o| o.identity()).collect();
        Ok(unique.len())
    }

    /// Create or update an object. Graph objects with an id are patched, without
    /// one they are created; RBAC objects are PUT at their full resource id.
    pub async fn upsert_object(&self, kind: ObjectType, obj: DirectoryObject) -> Result<DirectoryObject> {
        let stored = match kind {
            ObjectType::Subscription => {
                return Err(SyncError::Unsupported {
                    kind,
                    operation: "apply",
                })
            }
            k if k.family() == ApiFamily::Graph => {
                let base = self.graph_url(kind.endpoint());
                match obj.str_field("id").filter(|id| !id.is_empty()).map(str::to_string) {
                    Some(id) => {
                        let mut payload = obj.clone();
                        payload.remove("id");
                        let request = ApiRequest::patch(format!("{base}/{id}"), payload.into_value());
                        success_body(self.api.call(request).await?)?;
                        info!(kind = %kind, id = %id, "updated object");
                        obj
                    }
                    None => {
                        let request = ApiRequest::post(base, obj.into_value());
                        let body = success_body(self.api.call(request).await?)?;
                        let created = DirectoryObject::from_value(body).ok_or_else(|| {
                            SyncError::InvalidObject("create returned no object".into())
                        })?;
                        info!(kind = %kind, id = ?created.identity(), "created object");
                        created
                    }
                }
            }
            _ => {
                let id = obj
                    .str_field("id")
                    .filter(|id| id.starts_with('/'))
                    .map(str::to_string)
                    .ok_or_else(|| {
                        SyncError::InvalidObject(format!("{kind} objects need a full resource id"))
                    })?;
                let request = ApiRequest::put(self.arm_url(&id), obj.clone().into_value())
                    .with_param("api-version", kind.api_version().unwrap_or_default());
                let body = success_body(self.api.call(request).await?)?;
                info!(kind = %kind, id = %id, "applied object");
                DirectoryObject::from_value(body).unwrap_or(obj)
            }
        };

        self.remember(kind, &stored)?;
        Ok(stored)
    }

    /// Change an object's display name
    pub async fn rename_object(&self, kind: ObjectType, id: &str, new_name: &str) -> Result<()> {
        match kind {
            ObjectType::RoleDefinition => {
                let mut obj = self.get_by_id(kind, id).await?.ok_or_else(|| SyncError::NotFound {
                    kind,
                    id: id.to_string(),
                })?;
                let properties = obj.entry("properties").or_insert_with(|| json!({}));
                match properties.as_object_mut() {
                    Some(props) => {
                        props.insert("roleName".to_string(), json!(new_name));
                    }
                    None => {
                        return Err(SyncError::InvalidObject(
                            "role definition properties are not an object".into(),
                        ))
                    }
                }
                self.upsert_object(kind, obj).await?;
            }
            k if k.family() == ApiFamily::Graph && k != ObjectType::DirRoleAssignment => {
                let url = format!("{}/{id}", self.graph_url(kind.endpoint()));
                let request = ApiRequest::patch(url, json!({ "displayName": new_name }));
                success_body(self.api.call(request).await?)?;

                let mut update = DirectoryObject::new();
                update.insert("id".to_string(), json!(id));
                update.insert("displayName".to_string(), json!(new_name));
                self.remember(kind, &update)?;
            }
            _ => {
                return Err(SyncError::Unsupported {
                    kind,
                    operation: "rename",
                })
            }
        }
        info!(kind = %kind, id, new_name, "renamed object");
        Ok(())
    }

    /// Delete an object in Azure, then drop it from the cache
    pub async fn delete_object(&self, kind: ObjectType, id: &str) -> Result<()> {
        let not_found = || SyncError::NotFound {
            kind,
            id: id.to_string(),
        };

        let request = match kind.family() {
            ApiFamily::Graph => {
                ApiRequest::delete(format!("{}/{id}", self.graph_url(kind.endpoint())))
            }
            ApiFamily::Arm if kind == ObjectType::Subscription => {
                return Err(SyncError::Unsupported {
                    kind,
                    operation: "delete",
                })
            }
            ApiFamily::Arm => {
                let full_id = if id.starts_with('/') {
                    id.to_string()
                } else {
                    self.get_by_id(kind, id)
                        .await?
                        .and_then(|obj| obj.str_field("id").map(str::to_string))
                        .ok_or_else(not_found)?
                };
                ApiRequest::delete(self.arm_url(&full_id))
                    .with_param("api-version", kind.api_version().unwrap_or_default())
            }
        };

        let response = self.api.call(request).await?;
        match response.status {
            200..=299 => {}
            404 => return Err(not_found()),
            status => {
                return Err(SyncError::Api {
                    status,
                    message: response.error_message(),
                })
            }
        }

        let cache = self.cache(kind)?;
        if cache.delete(last_segment(id)) {
            cache.save()?;
        }
        info!(kind = %kind, id, "deleted object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use maz_cache::TenantContext;
    use maz_http::{ApiEndpoints, Method, RetryConfig};
    use tempfile::TempDir;

    use super::*;
    use crate::{probe::StaticProbe, refresh::SyncSettings, testing::MockApi};

    const APP_ID: &str = "11111111-2222-3333-4444-555555555555";

    fn engine(dir: &TempDir, api: &Arc<MockApi>) -> SyncEngine {
        SyncEngine::new(
            api.clone(),
            Arc::new(StaticProbe(true)),
            TenantContext::new("tenant", dir.path()),
            ApiEndpoints::new("https://graph.test", "https://arm.test"),
        )
        .with_settings(SyncSettings {
            retry: RetryConfig {
                initial_delay: Duration::from_millis(1),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn object(value: Value) -> DirectoryObject {
        DirectoryObject::from_value(value).unwrap()
    }

    #[test]
    fn test_odata_quote_and_segments() {
        assert_eq!(odata_quote("O'Brien"), "O''Brien");
        assert_eq!(last_segment("/subscriptions/s1/providers/x/roleAssignments/a1"), "a1");
        assert_eq!(last_segment("plain"), "plain");
    }

    #[tokio::test]
    async fn test_application_falls_back_to_app_id() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(
            Method::GET,
            "https://graph.test/v1.0/applications",
            200,
            json!({"value": [{"id": "obj-1", "appId": APP_ID, "displayName": "Billing"}]}),
        );
        let engine = engine(&dir, &api);

        let app = engine
            .get_by_id(ObjectType::Application, APP_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(app.str_field("id"), Some("obj-1"));

        let requests = api.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].params,
            vec![("$filter".to_string(), format!("appId eq '{APP_ID}'"))]
        );
        assert!(engine
            .cache(ObjectType::Application)
            .unwrap()
            .find_by_id("obj-1")
            .is_some());
    }

    #[tokio::test]
    async fn test_group_miss_has_no_fallback() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        let engine = engine(&dir, &api);

        assert!(engine.get_by_id(ObjectType::Group, APP_ID).await.unwrap().is_none());
        assert_eq!(api.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_get_by_id_forbidden_is_an_error() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(
            Method::GET,
            &format!("https://graph.test/v1.0/users/{APP_ID}"),
            403,
            json!({"error": {"code": "Authorization_RequestDenied", "message": "Insufficient privileges"}}),
        );
        let engine = engine(&dir, &api);

        let err = engine.get_by_id(ObjectType::User, APP_ID).await.unwrap_err();
        assert!(matches!(err, SyncError::Api { status: 403, .. }));
        assert!(err.to_string().contains("Insufficient privileges"));
    }

    #[tokio::test]
    async fn test_get_by_name_quotes_filter() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(
            Method::GET,
            "https://graph.test/v1.0/users",
            200,
            json!({"value": [{"id": "u1", "displayName": "Pat O'Brien"}]}),
        );
        let engine = engine(&dir, &api);

        let found = engine.get_by_name(ObjectType::User, "Pat O'Brien").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            api.requests()[0].params,
            vec![("$filter".to_string(), "displayName eq 'Pat O''Brien'".to_string())]
        );
    }

    #[tokio::test]
    async fn test_resolve_ambiguous_name() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(
            Method::GET,
            "https://graph.test/v1.0/groups",
            200,
            json!({"value": [
                {"id": "g1", "displayName": "Ops"},
                {"id": "g2", "displayName": "Ops"}
            ]}),
        );
        let engine = engine(&dir, &api);

        let err = engine.resolve(ObjectType::Group, "Ops").await.unwrap_err();
        assert!(matches!(err, SyncError::Ambiguous { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_resolve_unknown_uuid_is_not_found() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        let engine = engine(&dir, &api);

        let err = engine.resolve(ObjectType::Group, APP_ID).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_subscription_by_name_from_cache() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(
            Method::GET,
            "https://arm.test/subscriptions",
            200,
            json!({"value": [
                {"id": "/subscriptions/s1", "subscriptionId": "s1", "displayName": "Production", "state": "Enabled"}
            ]}),
        );
        let engine = engine(&dir, &api);

        let sub = engine.resolve(ObjectType::Subscription, "production").await.unwrap();
        assert_eq!(sub.str_field("subscriptionId"), Some("s1"));
    }

    #[tokio::test]
    async fn test_count_azure_graph() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(Method::GET, "https://graph.test/v1.0/groups/$count", 200, json!({"value": 42}));
        let engine = engine(&dir, &api);

        assert_eq!(engine.count_azure(ObjectType::Group).await.unwrap(), 42);
        assert_eq!(
            api.requests()[0].headers,
            vec![("ConsistencyLevel".to_string(), "eventual".to_string())]
        );
        assert_eq!(engine.count_local(ObjectType::Group).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_creates_and_caches() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(
            Method::POST,
            "https://graph.test/v1.0/groups",
            201,
            json!({"id": "new-id", "displayName": "Created", "mailNickname": "created"}),
        );
        let engine = engine(&dir, &api);

        let created = engine
            .upsert_object(
                ObjectType::Group,
                object(json!({"displayName": "Created", "mailNickname": "created"})),
            )
            .await
            .unwrap();
        assert_eq!(created.str_field("id"), Some("new-id"));
        assert_eq!(engine.count_local(ObjectType::Group).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_patches_without_id_in_payload() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(Method::PATCH, "https://graph.test/v1.0/groups/g1", 204, Value::Null);
        let engine = engine(&dir, &api);

        engine
            .upsert_object(
                ObjectType::Group,
                object(json!({"id": "g1", "displayName": "Patched"})),
            )
            .await
            .unwrap();
        let payload = api.requests()[0].payload.clone().unwrap();
        assert!(payload.get("id").is_none());
        let cached = engine.cache(ObjectType::Group).unwrap().find_by_id("g1").unwrap();
        assert_eq!(cached.display_name(), Some("Patched"));
    }

    #[tokio::test]
    async fn test_upsert_arm_requires_full_id() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        let engine = engine(&dir, &api);

        let err = engine
            .upsert_object(ObjectType::RoleDefinition, object(json!({"id": "r1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidObject(_)));
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_rename_graph_object() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(Method::PATCH, "https://graph.test/v1.0/applications/a1", 204, Value::Null);
        let engine = engine(&dir, &api);
        let cache = engine.cache(ObjectType::Application).unwrap();
        cache
            .upsert(&object(json!({"id": "a1", "displayName": "Old", "appId": "x"})))
            .unwrap();

        engine
            .rename_object(ObjectType::Application, "a1", "New")
            .await
            .unwrap();
        assert_eq!(
            api.requests()[0].payload,
            Some(json!({"displayName": "New"}))
        );
        let renamed = cache.find_by_id("a1").unwrap();
        assert_eq!(renamed.display_name(), Some("New"));
        assert_eq!(renamed.str_field("appId"), Some("x"));
    }

    #[tokio::test]
    async fn test_rename_role_definition_puts_role_name() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        let id = "/subscriptions/s1/providers/Microsoft.Authorization/roleDefinitions/r1";
        let body = json!({"id": id, "name": "r1", "properties": {"roleName": "Old", "type": "CustomRole"}});
        api.on(Method::GET, &format!("https://arm.test{id}"), 200, body);
        api.on(Method::PUT, &format!("https://arm.test{id}"), 200, Value::Null);
        let engine = engine(&dir, &api);

        engine
            .rename_object(ObjectType::RoleDefinition, id, "Renamed")
            .await
            .unwrap();
        let put = api
            .requests()
            .into_iter()
            .find(|r| r.method == Method::PUT)
            .unwrap();
        assert_eq!(put.payload.unwrap()["properties"]["roleName"], "Renamed");
    }

    #[tokio::test]
    async fn test_rename_unsupported() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        let engine = engine(&dir, &api);

        let err = engine
            .rename_object(ObjectType::Subscription, "s1", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_delete_graph_object() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.on(Method::DELETE, "https://graph.test/v1.0/groups/g1", 204, Value::Null);
        let engine = engine(&dir, &api);
        let cache = engine.cache(ObjectType::Group).unwrap();
        cache.upsert(&object(json!({"id": "g1"}))).unwrap();

        engine.delete_object(ObjectType::Group, "g1").await.unwrap();
        assert_eq!(cache.count(), 0);

        let err = engine.delete_object(ObjectType::Group, "g2").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_role_assignment_by_full_id() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        let id = "/subscriptions/s1/providers/Microsoft.Authorization/roleAssignments/a1";
        api.on(Method::DELETE, &format!("https://arm.test{id}"), 200, json!({"id": id}));
        let engine = engine(&dir, &api);
        let cache = engine.cache(ObjectType::RoleAssignment).unwrap();
        cache.upsert(&object(json!({"id": id, "name": "a1"}))).unwrap();

        engine
            .delete_object(ObjectType::RoleAssignment, id)
            .await
            .unwrap();
        assert_eq!(cache.count(), 0);
        assert_eq!(
            api.requests()[0].params,
            vec![("api-version".to_string(), "2022-04-01".to_string())]
        );
    }
}
