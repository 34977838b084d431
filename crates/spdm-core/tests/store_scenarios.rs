use serde_json::json;
use std::sync::Arc;
use std::thread;

use spdm_core::model::{EdgeKind, GraphEdge, GraphNode, NewVersion, ParameterNode, VersionKey};
use spdm_core::store::{GraphStore, InMemoryGraphStore, VersionQuery};
use spdm_core::CoreError;

fn graph(v: &str) -> NewVersion {
    NewVersion::new(VersionKey::new("demo", v),
                    "alice",
                    vec![GraphNode::artifact("a", "a.py").with_position(1.0, 2.0),
                         GraphNode::parameter("a_out", ParameterNode::output("x")),
                         GraphNode::artifact("b", "b.py"),
                         GraphNode::parameter("b_x", ParameterNode::input("x", json!(0)))],
                    vec![GraphEdge::new("c1", "a", "a_out", EdgeKind::Containment),
                         GraphEdge::new("c2", "b_x", "b", EdgeKind::Containment),
                         GraphEdge::new("d1", "a", "b", EdgeKind::DependsOn)])
}

fn store() -> InMemoryGraphStore {
    let s = InMemoryGraphStore::new();
    s.create_process("demo", "alice").unwrap();
    s
}

#[test]
fn creating_v1_twice_is_success_then_conflict() {
    let s = store();
    assert!(s.create_version(graph("v1")).is_ok());
    assert!(matches!(s.create_version(graph("v1")), Err(CoreError::Conflict(_))));
}

#[test]
fn concurrent_creates_yield_exactly_one_success() {
    let s = Arc::new(store());
    let handles: Vec<_> = (0..8).map(|_| {
                                    let s = s.clone();
                                    thread::spawn(move || s.create_version(graph("v1")).is_ok())
                                })
                                .collect();
    let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
    assert_eq!(wins, 1);
}

#[test]
fn delete_then_fetch_returns_empty_graph() {
    let s = store();
    s.create_version(graph("v1")).unwrap();
    let key = VersionKey::new("demo", "v1");
    assert!(s.delete_version(&key).unwrap());
    assert!(s.fetch_version(&key).unwrap().is_empty());
    // idempotente
    assert!(!s.delete_version(&key).unwrap());
}

#[test]
fn fetch_round_trips_modulo_timestamps() {
    let s = store();
    let input = graph("v1");
    let expected = input.clone().into_snapshot(chrono::Utc::now()).content_fingerprint();
    let committed = s.create_version(input).unwrap();
    let fetched = s.fetch_version(&committed.key).unwrap();
    assert_eq!(fetched.content_fingerprint(), expected);
    assert!(fetched.nodes.iter().all(|n| n.created_at.is_some()));
    assert_eq!(fetched.links.len(), 2);
    assert!(fetched.links.iter().all(|l| l.process == "demo" && l.created_by == "alice"));
}

#[test]
fn latest_version_is_most_recent() {
    let s = store();
    assert!(matches!(s.fetch_latest_version("demo"), Err(CoreError::NotFound(_))));
    s.create_version(graph("v1")).unwrap();
    thread::sleep(std::time::Duration::from_millis(5));
    s.create_version(graph("v2")).unwrap();
    assert_eq!(s.fetch_latest_version("demo").unwrap().key.version, "v2");
    let page = s.list_versions("demo", &VersionQuery::default()).unwrap();
    let names: Vec<&str> = page.items.iter().map(|v| v.key.version.as_str()).collect();
    assert_eq!(names, vec!["v2", "v1"]);
}
