use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use spdm_core::hashing::hash_value;
use spdm_core::model::{GraphNode, NewVersion, ParameterNode, VersionKey};

fn version(x: Value) -> NewVersion {
    NewVersion::new(VersionKey::new("demo", "v1"),
                    "alice",
                    vec![GraphNode::artifact("a", "a.py"), GraphNode::parameter("p", ParameterNode::input("x", x))],
                    vec![])
}

#[test]
fn fingerprint_ignores_stamps_but_not_values() {
    let early = version(json!(1)).into_snapshot(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let late = version(json!(1)).into_snapshot(Utc::now());
    assert_eq!(early.content_fingerprint(), late.content_fingerprint());
    assert_eq!(early.content_fingerprint().len(), 64);

    let changed = version(json!(2)).into_snapshot(Utc::now());
    assert_ne!(early.content_fingerprint(), changed.content_fingerprint());
}

#[test]
fn hash_value_is_key_order_independent() {
    assert_eq!(hash_value(&json!({"b": 2, "a": 1})), hash_value(&json!({"a": 1, "b": 2})));
}
