//! Property-based tests for the object mirror
//! Covers persistence round trips, merge idempotence, batch deletion and identity rules.

use std::collections::HashSet;

use maz_cache::{
    storage::{self, FILE_MODE},
    Cache, DirectoryObject, DirectoryObjectList, ObjectType, TenantContext,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use tempfile::TempDir;

/// Strategy for arbitrary JSON leaves that survive a binary round trip
fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
        "[a-zA-Z0-9 ._-]{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for nested JSON values (maps and lists of leaves, a few levels deep)
fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for an object with a unique identity
fn object_strategy() -> impl Strategy<Value = DirectoryObject> {
    (
        "[a-f0-9]{8}",
        prop::collection::btree_map("[a-z]{1,8}", value_strategy(), 0..6),
    )
        .prop_map(|(id, fields)| {
            let mut map: Map<String, Value> = fields.into_iter().collect();
            map.insert("id".to_string(), Value::String(id));
            DirectoryObject::from(map)
        })
}

fn list_strategy() -> impl Strategy<Value = DirectoryObjectList> {
    prop::collection::vec(object_strategy(), 0..20).prop_map(|objects| {
        let mut list = DirectoryObjectList::new();
        for obj in objects {
            list.add(obj);
        }
        list
    })
}

/// Property: for all lists and compression settings, loading what was saved
/// reproduces the list exactly.
#[test]
fn prop_save_load_round_trip() {
    proptest!(ProptestConfig::with_cases(64), |(list in list_strategy(), compress in any::<bool>())| {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("objects.bin");

        storage::save(&path, &list, FILE_MODE, compress).unwrap();
        let loaded: DirectoryObjectList = storage::load(&path, compress).unwrap();

        prop_assert_eq!(loaded, list);
    });
}

/// Property: upserting the same object twice leaves the same state as once.
#[test]
fn prop_upsert_idempotent() {
    proptest!(ProptestConfig::with_cases(64), |(seed in list_strategy(), obj in object_strategy())| {
        let dir = TempDir::new().unwrap();
        let cache = Cache::open(ObjectType::User, &TenantContext::new("t", dir.path())).unwrap();
        for existing in seed.iter() {
            cache.upsert(existing).unwrap();
        }

        cache.upsert(&obj).unwrap();
        let once = cache.snapshot();
        cache.upsert(&obj).unwrap();

        prop_assert_eq!(cache.snapshot(), once);
    });
}

/// Property: merging preserves existing-only fields and takes incoming values.
#[test]
fn prop_merge_overwrites_and_preserves() {
    proptest!(|(a in object_strategy(), b in object_strategy())| {
        let mut merged = a.clone();
        merged.merge(&b);

        for (key, value) in b.iter() {
            match (a.get(key), value) {
                (Some(Value::Object(_)), Value::Object(_)) => {}
                _ => prop_assert_eq!(merged.get(key), Some(value)),
            }
        }
        for key in a.keys() {
            prop_assert!(merged.contains_key(key));
        }
    });
}

/// Property: a batch delete equals deleting each id one at a time, in any order.
#[test]
fn prop_batch_delete_equivalence() {
    proptest!(|(list in list_strategy(), picks in prop::collection::vec(any::<prop::sample::Index>(), 0..10), extra in "[g-z]{4}")| {
        let ids: Vec<String> = list.iter().filter_map(|o| o.identity()).collect();
        let mut targets: HashSet<String> = if ids.is_empty() {
            HashSet::new()
        } else {
            picks.iter().map(|p| ids[p.index(ids.len())].clone()).collect()
        };
        // ids that are not present must be harmless
        targets.insert(extra);

        let mut batched = list.clone();
        batched.batch_delete(&targets);

        let mut forward = list.clone();
        for id in &targets {
            forward.delete_by_id(id);
        }
        let mut reversed = list.clone();
        let mut order: Vec<_> = targets.iter().collect();
        order.reverse();
        for id in order {
            reversed.delete_by_id(id);
        }

        prop_assert_eq!(&batched, &forward);
        prop_assert_eq!(&batched, &reversed);
    });
}

/// Property: `id` beats `name`, `name` beats `subscriptionId`.
#[test]
fn prop_identity_priority() {
    proptest!(|(id in "[a-z0-9]{1,12}", name in "[a-z0-9]{1,12}", sub in "[a-z0-9]{1,12}")| {
        let all = DirectoryObject::from_value(json!({"id": id, "name": name, "subscriptionId": sub})).unwrap();
        prop_assert_eq!(all.identity(), Some(id.clone()));

        let no_id = DirectoryObject::from_value(json!({"name": name, "subscriptionId": sub})).unwrap();
        prop_assert_eq!(no_id.identity(), Some(name.clone()));

        let only_sub = DirectoryObject::from_value(json!({"subscriptionId": sub})).unwrap();
        prop_assert_eq!(only_sub.identity(), Some(sub.clone()));

        let none = DirectoryObject::from_value(json!({"displayName": id})).unwrap();
        prop_assert_eq!(none.identity(), None);
    });
}

/// Property: a needle buried in a list of maps of lists is found regardless of case.
#[test]
fn prop_has_string_depth() {
    proptest!(|(needle in "[a-z]{3,10}", prefix in "[0-9]{0,4}", upper in any::<bool>())| {
        let stored = if upper { needle.to_uppercase() } else { needle.clone() };
        let obj = DirectoryObject::from_value(json!({
            "id": "x",
            "level1": [{"level2": [{"level3": format!("{}{}", prefix, stored)}]}]
        }))
        .unwrap();

        prop_assert!(obj.has_string(&needle));
        prop_assert!(obj.has_string(&needle.to_uppercase()));
        let needle_hash = format!("{}#", needle);
        prop_assert!(!obj.has_string(&needle_hash));
    });
}
