//! Edge case and property tests for mirror-engine
//!
//! These tests cover boundary conditions, unusual keys, and the convergence
//! guarantees of reconciliation over arbitrary replica/snapshot pairs.

use mirror_engine::{reconcile, ChangeOp, Error, FieldKey, Key, KeyExtractor, Snapshot};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};

fn by_id() -> FieldKey {
    FieldKey::new("id")
}

/// Apply a change batch to a keyed store the way a replica owner would.
fn apply(store: &mut BTreeMap<Key, Value>, ops: Vec<ChangeOp<Value>>) {
    for op in ops {
        let key = op.key(&by_id()).unwrap();
        match op {
            ChangeOp::Insert(item) | ChangeOp::Update(item) => {
                store.insert(key, item);
            }
            ChangeOp::Delete(_) => {
                store.remove(&key);
            }
        }
    }
}

// ============================================================================
// Key Edge Cases
// ============================================================================

#[test]
fn string_and_integer_keys_do_not_collide() {
    let current = vec![json!({"id": 1, "kind": "int"})];
    let snapshot =
        Snapshot::from_items(vec![json!({"id": "1", "kind": "str"})], &by_id()).unwrap();

    let result = reconcile(current, snapshot, &by_id()).unwrap();

    assert_eq!(
        result.ops,
        vec![
            ChangeOp::Delete(json!({"id": 1, "kind": "int"})),
            ChangeOp::Insert(json!({"id": "1", "kind": "str"})),
        ]
    );
}

#[test]
fn unicode_and_empty_string_keys() {
    let keys = ["", "日本語", "🎉🚀", "Hello\nWorld", "Null\0Test"];
    let items: Vec<_> = keys.iter().map(|k| json!({"id": k})).collect();
    let snapshot = Snapshot::from_items(items.clone(), &by_id()).unwrap();

    let result = reconcile(items, snapshot, &by_id()).unwrap();

    assert_eq!(result.updated, keys.len());
    assert_eq!(result.inserted + result.deleted, 0);
}

#[test]
fn integer_key_boundaries() {
    let items = vec![
        json!({"id": i64::MIN}),
        json!({"id": 0}),
        json!({"id": i64::MAX}),
    ];
    let snapshot = Snapshot::from_items(items, &by_id()).unwrap();

    assert!(snapshot.contains_key(&Key::Int(i64::MIN)));
    assert!(snapshot.contains_key(&Key::Int(i64::MAX)));
}

#[test]
fn integer_key_displays_for_remote_addressing() {
    assert_eq!(Key::Int(-5).to_string(), "-5");
    assert_eq!(Key::Int(i64::MAX).to_string(), "9223372036854775807");
}

#[test]
fn null_item_in_replica_is_a_key_error() {
    let current = vec![json!({"id": 1}), Value::Null];
    let result = reconcile(current, Snapshot::new(), &by_id());

    assert_eq!(result, Err(Error::MissingKey("id".into())));
}

#[test]
fn boolean_key_is_rejected() {
    let result = by_id().key_of(&json!({"id": true}));
    assert_eq!(
        result,
        Err(Error::InvalidKey {
            field: "id".into(),
            got: "bool".into()
        })
    );
}

// ============================================================================
// Payload Edge Cases
// ============================================================================

#[test]
fn deeply_nested_payload_passes_through_untouched() {
    let mut nested = json!({"leaf": true});
    for _ in 0..64 {
        nested = json!({"child": nested});
    }
    let item = json!({"id": "deep", "data": nested});
    let snapshot = Snapshot::from_items(vec![item.clone()], &by_id()).unwrap();

    let result = reconcile(Vec::new(), snapshot, &by_id()).unwrap();
    assert_eq!(result.ops, vec![ChangeOp::Insert(item)]);
}

#[test]
fn unchanged_item_still_emits_update() {
    let item = json!({"id": 1, "title": "same"});
    let snapshot = Snapshot::from_items(vec![item.clone()], &by_id()).unwrap();

    let result = reconcile(vec![item.clone()], snapshot, &by_id()).unwrap();
    assert_eq!(result.ops, vec![ChangeOp::Update(item)]);
}

// ============================================================================
// Large Batches
// ============================================================================

#[test]
fn full_turnover_of_large_replica() {
    let current: Vec<_> = (0..1000).map(|i| json!({"id": i})).collect();
    let incoming: Vec<_> = (1000..2000).map(|i| json!({"id": i})).collect();
    let snapshot = Snapshot::from_items(incoming, &by_id()).unwrap();

    let result = reconcile(current, snapshot, &by_id()).unwrap();

    assert_eq!(result.deleted, 1000);
    assert_eq!(result.inserted, 1000);
    assert_eq!(result.updated, 0);
}

// ============================================================================
// Properties
// ============================================================================

fn keys_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..12, 0..16)
}

fn item(key: u8, tag: &str) -> Value {
    if key % 3 == 0 {
        json!({"id": format!("k{key}"), "tag": tag})
    } else {
        json!({"id": key as i64, "tag": tag})
    }
}

proptest! {
    #[test]
    fn applying_batch_converges_to_snapshot_keys(
        local in keys_strategy(),
        remote in keys_strategy(),
    ) {
        let current: Vec<_> = local.iter().map(|&k| item(k, "local")).collect();
        let snapshot = Snapshot::from_items(
            remote.iter().map(|&k| item(k, "remote")),
            &by_id(),
        ).unwrap();
        let expected_keys: BTreeSet<Key> = snapshot.keys().cloned().collect();

        let mut store: BTreeMap<Key, Value> = current
            .iter()
            .map(|v| (by_id().key_of(v).unwrap(), v.clone()))
            .collect();

        let result = reconcile(current, snapshot, &by_id()).unwrap();
        apply(&mut store, result.ops);

        let actual_keys: BTreeSet<Key> = store.keys().cloned().collect();
        prop_assert_eq!(actual_keys, expected_keys);
        prop_assert!(store.values().all(|v| v["tag"] == "remote"));
    }

    #[test]
    fn at_most_one_op_per_key(
        local in keys_strategy(),
        remote in keys_strategy(),
    ) {
        let current: Vec<_> = local.iter().map(|&k| item(k, "local")).collect();
        let snapshot = Snapshot::from_items(
            remote.iter().map(|&k| item(k, "remote")),
            &by_id(),
        ).unwrap();
        let local_distinct: HashSet<u8> = local.iter().copied().collect();
        let remote_distinct: HashSet<u8> = remote.iter().copied().collect();

        let result = reconcile(current, snapshot, &by_id()).unwrap();

        let mut seen = HashSet::new();
        for op in &result.ops {
            prop_assert!(seen.insert(op.key(&by_id()).unwrap()));
        }
        prop_assert!(result.len() <= local_distinct.len() + remote_distinct.len());
        prop_assert_eq!(result.deleted, local_distinct.difference(&remote_distinct).count());
        prop_assert_eq!(result.updated, local_distinct.intersection(&remote_distinct).count());
    }

    #[test]
    fn deletes_always_come_first(
        local in keys_strategy(),
        remote in keys_strategy(),
    ) {
        let current: Vec<_> = local.iter().map(|&k| item(k, "local")).collect();
        let snapshot = Snapshot::from_items(
            remote.iter().map(|&k| item(k, "remote")),
            &by_id(),
        ).unwrap();

        let result = reconcile(current, snapshot, &by_id()).unwrap();
        let first_non_delete = result
            .ops
            .iter()
            .position(|op| !matches!(op, ChangeOp::Delete(_)))
            .unwrap_or(result.len());

        prop_assert!(result.ops[first_non_delete..]
            .iter()
            .all(|op| !matches!(op, ChangeOp::Delete(_))));
    }
}
