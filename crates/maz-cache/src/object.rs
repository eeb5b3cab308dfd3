//! Generic Azure objects
//!
//! The cache layer treats every Azure object as a bag of JSON fields. Identity is
//! derived from the fields rather than assumed, because resource role objects and
//! subscriptions key on `name` / `subscriptionId` instead of `id`.

use std::{
    collections::{HashMap, HashSet},
    ops::{Deref, DerefMut},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kind::{FieldRule, ObjectType};

/// Fields tried, in order, when deriving an object's identity
pub const IDENTITY_FIELDS: [&str; 3] = ["id", "name", "subscriptionId"];

/// Marker the Graph delta protocol puts on deleted entries
pub const REMOVED_MARKER: &str = "@removed";

/// A single Azure directory or resource object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryObject(Map<String, Value>);

impl DirectoryObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; anything other than an object yields `None`
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// String value of a top-level field, if it is a string
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.str_field("displayName")
            .or_else(|| self.nested_str("properties", "displayName"))
            .or_else(|| self.nested_str("properties", "roleName"))
    }

    fn nested_str(&self, parent: &str, child: &str) -> Option<&str> {
        self.0
            .get(parent)
            .and_then(Value::as_object)
            .and_then(|m| m.get(child))
            .and_then(Value::as_str)
    }

    /// Derived identity: the last path segment of `id`, else `name`, else
    /// `subscriptionId`. Empty, `.` and `/` never count as an identity.
    pub fn identity(&self) -> Option<String> {
        IDENTITY_FIELDS
            .iter()
            .filter_map(|field| self.str_field(field))
            .find_map(base_segment)
    }

    /// True when a delta response flags this entry as deleted
    pub fn is_removed(&self) -> bool {
        self.0.contains_key(REMOVED_MARKER)
    }

    /// Case-insensitive substring search over every string value, at any depth
    pub fn has_string(&self, filter: &str) -> bool {
        let needle = filter.to_lowercase();
        self.0.values().any(|v| value_has_string(v, &needle))
    }

    /// Copy of this object reduced to the fields the type's cache may retain
    pub fn trim_for_cache(&self, kind: ObjectType) -> DirectoryObject {
        let mut trimmed = Map::new();
        for rule in kind.cache_fields() {
            match *rule {
                FieldRule::Keep(field) => {
                    if let Some(v) = self.0.get(field) {
                        trimmed.insert(field.to_string(), v.clone());
                    }
                }
                FieldRule::Nested(parent, children) => {
                    if let Some(Value::Object(inner)) = self.0.get(parent) {
                        let kept: Map<String, Value> = children
                            .iter()
                            .filter_map(|c| inner.get(*c).map(|v| (c.to_string(), v.clone())))
                            .collect();
                        trimmed.insert(parent.to_string(), Value::Object(kept));
                    }
                }
                FieldRule::Lift(parent, child) => {
                    if let Some(v) = self.0.get(parent).and_then(|p| p.get(child)) {
                        trimmed.insert(child.to_string(), v.clone());
                    }
                }
            }
        }
        DirectoryObject(trimmed)
    }

    /// Merge `incoming` into this object. Conflicting fields take the incoming
    /// value, nested maps merge field by field, fields only present here stay.
    pub fn merge(&mut self, incoming: &DirectoryObject) {
        merge_maps(&mut self.0, &incoming.0);
    }
}

impl Deref for DirectoryObject {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DirectoryObject {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for DirectoryObject {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Merge helper over raw JSON maps
pub fn merge_maps(existing: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, new_value) in incoming {
        match (existing.get_mut(key), new_value) {
            (Some(Value::Object(old)), Value::Object(new)) => merge_maps(old, new),
            _ => {
                existing.insert(key.clone(), new_value.clone());
            }
        }
    }
}

fn base_segment(raw: &str) -> Option<String> {
    let trimmed = raw.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    match last {
        "" | "." => None,
        other => Some(other.to_string()),
    }
}

fn value_has_string(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| value_has_string(v, needle)),
        Value::Object(map) => map.values().any(|v| value_has_string(v, needle)),
        _ => false,
    }
}

/// Ordered list of objects, unique by derived identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryObjectList(Vec<DirectoryObject>);

impl DirectoryObjectList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DirectoryObject> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[DirectoryObject] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<DirectoryObject> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.0
            .iter()
            .position(|o| o.identity().as_deref() == Some(id))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&DirectoryObject> {
        self.position(id).map(|i| &self.0[i])
    }

    /// First object whose display name matches, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<&DirectoryObject> {
        self.0.iter().find(|o| {
            o.display_name()
                .map_or(false, |n| n.eq_ignore_ascii_case(name))
        })
    }

    pub fn exists(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Append unless an object with the same identity is already present.
    /// Returns false for duplicates and identity-less objects.
    pub fn add(&mut self, obj: DirectoryObject) -> bool {
        match obj.identity() {
            Some(id) if !self.exists(&id) => {
                self.0.push(obj);
                true
            }
            _ => false,
        }
    }

    /// Merge into the existing object with the same identity, or append
    pub fn upsert(&mut self, id: &str, obj: &DirectoryObject) {
        match self.position(id) {
            Some(i) => self.0[i].merge(obj),
            None => self.0.push(obj.clone()),
        }
    }

    /// Upsert many `(identity, object)` pairs with a single index pass
    pub fn upsert_many<'a, I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, &'a DirectoryObject)>,
    {
        let mut index: HashMap<String, usize> = self
            .0
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.identity().map(|id| (id, i)))
            .collect();

        let mut applied = 0;
        for (id, obj) in entries {
            match index.get(id) {
                Some(&i) => self.0[i].merge(obj),
                None => {
                    index.insert(id.to_string(), self.0.len());
                    self.0.push(obj.clone());
                }
            }
            applied += 1;
        }
        applied
    }

    pub fn delete_by_id(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(i) => {
                self.0.remove(i);
                true
            }
            None => false,
        }
    }

    /// Remove every object whose identity is in `ids`, in one pass
    pub fn batch_delete(&mut self, ids: &HashSet<String>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let before = self.0.len();
        self.0
            .retain(|o| o.identity().map_or(true, |id| !ids.contains(&id)));
        before - self.0.len()
    }
}

impl From<Vec<DirectoryObject>> for DirectoryObjectList {
    fn from(items: Vec<DirectoryObject>) -> Self {
        Self(items)
    }
}

impl FromIterator<DirectoryObject> for DirectoryObjectList {
    fn from_iter<I: IntoIterator<Item = DirectoryObject>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for DirectoryObjectList {
    type Item = DirectoryObject;
    type IntoIter = std::vec::IntoIter<DirectoryObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DirectoryObjectList {
    type Item = &'a DirectoryObject;
    type IntoIter = std::slice::Iter<'a, DirectoryObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> DirectoryObject {
        DirectoryObject::from_value(value).unwrap()
    }

    #[test]
    fn test_identity_prefers_id_over_name() {
        let o = obj(json!({"id": "abc", "name": "xyz"}));
        assert_eq!(o.identity().as_deref(), Some("abc"));
    }

    #[test]
    fn test_identity_uses_last_path_segment() {
        let o = obj(json!({
            "id": "/providers/Microsoft.Authorization/roleDefinitions/1111-2222"
        }));
        assert_eq!(o.identity().as_deref(), Some("1111-2222"));
    }

    #[test]
    fn test_identity_falls_back_to_subscription_id() {
        let o = obj(json!({"id": "/", "subscriptionId": "sub-1"}));
        assert_eq!(o.identity().as_deref(), Some("sub-1"));
    }

    #[test]
    fn test_identity_rejects_trivial_values() {
        assert_eq!(obj(json!({"id": ""})).identity(), None);
        assert_eq!(obj(json!({"id": "."})).identity(), None);
        assert_eq!(obj(json!({"name": "/"})).identity(), None);
        assert_eq!(obj(json!({"displayName": "x"})).identity(), None);
        assert_eq!(obj(json!({"id": 42})).identity(), None);
    }

    #[test]
    fn test_has_string_nested_case_insensitive() {
        let o = obj(json!({
            "id": "1",
            "roles": [{"grants": [{"scope": "Storage-ACCOUNT-Reader"}]}]
        }));
        assert!(o.has_string("account-reader"));
        assert!(!o.has_string("writer"));
    }

    #[test]
    fn test_has_string_ignores_keys_and_numbers() {
        let o = obj(json!({"secretKey": 12345}));
        assert!(!o.has_string("secret"));
        assert!(!o.has_string("123"));
    }

    #[test]
    fn test_merge_is_recursive() {
        let mut existing = obj(json!({
            "id": "1",
            "displayName": "old",
            "keep": true,
            "properties": {"a": 1, "b": 2}
        }));
        let incoming = obj(json!({
            "displayName": "new",
            "properties": {"b": 3, "c": 4}
        }));
        existing.merge(&incoming);
        assert_eq!(
            existing.into_value(),
            json!({
                "id": "1",
                "displayName": "new",
                "keep": true,
                "properties": {"a": 1, "b": 3, "c": 4}
            })
        );
    }

    #[test]
    fn test_trim_user() {
        let o = obj(json!({
            "id": "u1",
            "displayName": "Ann",
            "userPrincipalName": "ann@contoso.com",
            "mail": "ann@contoso.com",
            "jobTitle": "ops"
        }));
        let trimmed = o.trim_for_cache(ObjectType::User);
        assert_eq!(
            trimmed.into_value(),
            json!({"id": "u1", "displayName": "Ann", "userPrincipalName": "ann@contoso.com"})
        );
    }

    #[test]
    fn test_trim_role_definition_keeps_listed_properties() {
        let o = obj(json!({
            "id": "/providers/Microsoft.Authorization/roleDefinitions/r1",
            "name": "r1",
            "type": "Microsoft.Authorization/roleDefinitions",
            "properties": {
                "roleName": "Reader",
                "permissions": [{"actions": ["*/read"]}],
                "createdOn": "2020-01-01"
            }
        }));
        let trimmed = o.trim_for_cache(ObjectType::RoleDefinition);
        assert!(trimmed.get("type").is_none());
        let props = trimmed.get("properties").unwrap();
        assert_eq!(props["roleName"], "Reader");
        assert!(props.get("createdOn").is_none());
    }

    #[test]
    fn test_trim_management_group_lifts_properties() {
        let o = obj(json!({
            "id": "/providers/Microsoft.Management/managementGroups/mg1",
            "name": "mg1",
            "properties": {"displayName": "Root", "tenantId": "t1", "details": {}}
        }));
        let trimmed = o.trim_for_cache(ObjectType::ManagementGroup);
        assert_eq!(trimmed.str_field("displayName"), Some("Root"));
        assert_eq!(trimmed.str_field("tenantId"), Some("t1"));
        assert!(trimmed.get("properties").is_none());
    }

    #[test]
    fn test_list_add_rejects_duplicates() {
        let mut list = DirectoryObjectList::new();
        assert!(list.add(obj(json!({"id": "1"}))));
        assert!(!list.add(obj(json!({"id": "1", "displayName": "dup"}))));
        assert!(!list.add(obj(json!({"displayName": "no id"}))));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_list_find_by_name() {
        let list: DirectoryObjectList = vec![
            obj(json!({"id": "1", "displayName": "Alpha"})),
            obj(json!({"id": "2", "displayName": "Beta"})),
        ]
        .into();
        assert_eq!(
            list.find_by_name("beta").and_then(|o| o.identity()),
            Some("2".to_string())
        );
        assert!(list.find_by_name("gamma").is_none());
    }

    #[test]
    fn test_batch_delete_single_pass() {
        let mut list: DirectoryObjectList =
            (0..10).map(|i| obj(json!({"id": i.to_string()}))).collect();
        let ids: HashSet<String> = ["2", "4", "99"].iter().map(|s| s.to_string()).collect();
        assert_eq!(list.batch_delete(&ids), 2);
        assert_eq!(list.len(), 8);
        assert!(!list.exists("2"));
    }

    #[test]
    fn test_upsert_many_merges_and_appends() {
        let mut list: DirectoryObjectList =
            vec![obj(json!({"id": "1", "displayName": "a", "extra": 1}))].into();
        let updated = obj(json!({"id": "1", "displayName": "b"}));
        let added = obj(json!({"id": "2"}));
        let applied = list.upsert_many([("1", &updated), ("2", &added)]);
        assert_eq!(applied, 2);
        assert_eq!(list.len(), 2);
        let first = list.find_by_id("1").unwrap();
        assert_eq!(first.str_field("displayName"), Some("b"));
        assert_eq!(first.get("extra"), Some(&json!(1)));
    }
}
