use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use indexmap::IndexMap;

use super::{sort_newest_first, GraphStore, Page, VersionQuery};
use crate::errors::{CoreError, CoreResult};
use crate::model::{NewVersion, ParameterUpdate, ProcessSummary, VersionKey, VersionSnapshot, VersionSummary};

struct ProcessEntry {
    created_by: String,
    created_at: DateTime<Utc>,
    versions: IndexMap<String, VersionSnapshot>,
}

/// Store en memoria. Cada proceso vive en una entrada del `DashMap`; las
/// mutaciones se hacen con la entrada bloqueada, lo que da la misma
/// atomicidad por versión que una transacción del backend Postgres.
#[derive(Default)]
pub struct InMemoryGraphStore {
    processes: DashMap<String, ProcessEntry>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary_of(s: &VersionSnapshot) -> Option<VersionSummary> {
    Some(VersionSummary { key: s.key.clone(),
                          created_by: s.created_by.clone().unwrap_or_default(),
                          created_at: s.created_at? })
}

impl GraphStore for InMemoryGraphStore {
    fn create_process(&self, name: &str, creator: &str) -> CoreResult<()> {
        match self.processes.entry(name.to_string()) {
            Entry::Occupied(_) => Err(CoreError::Conflict(format!("process {name} already exists"))),
            Entry::Vacant(v) => {
                v.insert(ProcessEntry { created_by: creator.to_string(),
                                        created_at: Utc::now(),
                                        versions: IndexMap::new() });
                log::debug!("process {name} created by {creator}");
                Ok(())
            }
        }
    }

    fn process_exists(&self, name: &str) -> CoreResult<bool> {
        Ok(self.processes.contains_key(name))
    }

    fn create_version(&self, version: NewVersion) -> CoreResult<VersionSnapshot> {
        version.validate()?;
        let key = version.key.clone();
        let mut entry = self.processes
                            .get_mut(&key.process)
                            .ok_or_else(|| CoreError::not_found(format!("process {}", key.process)))?;
        if entry.versions.contains_key(&key.version) {
            return Err(CoreError::Conflict(format!("version {} of {} already exists", key.version, key.process)));
        }
        let snapshot = version.into_snapshot(Utc::now());
        entry.versions.insert(key.version.clone(), snapshot.clone());
        log::debug!("version {key} committed ({} nodes, {} edges)", snapshot.nodes.len(), snapshot.edges.len());
        Ok(snapshot)
    }

    fn replace_version(&self, version: NewVersion) -> CoreResult<VersionSnapshot> {
        version.validate()?;
        let key = version.key.clone();
        let mut entry = self.processes
                            .get_mut(&key.process)
                            .ok_or_else(|| CoreError::not_found(format!("process {}", key.process)))?;
        let Some(slot) = entry.versions.get_mut(&key.version) else {
            return Err(CoreError::not_found(format!("version {key}")));
        };
        let snapshot = version.into_snapshot(Utc::now());
        *slot = snapshot.clone();
        log::debug!("version {key} replaced");
        Ok(snapshot)
    }

    fn delete_version(&self, key: &VersionKey) -> CoreResult<bool> {
        let removed = self.processes
                          .get_mut(&key.process)
                          .map(|mut e| e.versions.shift_remove(&key.version).is_some())
                          .unwrap_or(false);
        log::debug!("delete {key}: removed={removed}");
        Ok(removed)
    }

    fn fetch_version(&self, key: &VersionKey) -> CoreResult<VersionSnapshot> {
        Ok(self.processes
               .get(&key.process)
               .and_then(|e| e.versions.get(&key.version).cloned())
               .unwrap_or_else(|| VersionSnapshot::empty(key.clone())))
    }

    fn fetch_latest_version(&self, process: &str) -> CoreResult<VersionSnapshot> {
        let entry = self.processes
                        .get(process)
                        .ok_or_else(|| CoreError::not_found(format!("process {process}")))?;
        let mut summaries: Vec<VersionSummary> = entry.versions.values().filter_map(summary_of).collect();
        sort_newest_first(&mut summaries);
        let latest = summaries.first()
                              .ok_or_else(|| CoreError::not_found(format!("no version for process {process}")))?;
        entry.versions
             .get(&latest.key.version)
             .cloned()
             .ok_or_else(|| CoreError::not_found(format!("version {}", latest.key)))
    }

    fn list_versions(&self, process: &str, query: &VersionQuery) -> CoreResult<Page<VersionSummary>> {
        let all = self.processes
                      .get(process)
                      .map(|e| e.versions.values().filter_map(summary_of).collect())
                      .unwrap_or_default();
        Ok(query.paginate(all))
    }

    fn list_processes(&self, query: &VersionQuery) -> CoreResult<Page<ProcessSummary>> {
        let all = self.processes
                      .iter()
                      .map(|e| ProcessSummary { name: e.key().clone(),
                                                created_by: e.created_by.clone(),
                                                created_at: e.created_at })
                      .collect();
        Ok(query.paginate(all))
    }

    fn update_parameters(&self, key: &VersionKey, updates: &[ParameterUpdate]) -> CoreResult<()> {
        let mut entry = self.processes
                            .get_mut(&key.process)
                            .ok_or_else(|| CoreError::not_found(format!("process {}", key.process)))?;
        let snapshot = entry.versions
                            .get_mut(&key.version)
                            .ok_or_else(|| CoreError::not_found(format!("version {key}")))?;
        snapshot.apply_parameter_updates(updates)?;
        log::debug!("{key}: {} parameter value(s) updated", updates.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, GraphEdge, GraphNode, ParameterNode};
    use serde_json::json;

    fn new_version(v: &str) -> NewVersion {
        NewVersion::new(VersionKey::new("demo", v),
                        "alice",
                        vec![GraphNode::artifact("a", "a.py"), GraphNode::parameter("p", ParameterNode::input("x", json!(1)))],
                        vec![GraphEdge::new("e", "p", "a", EdgeKind::Containment)])
    }

    #[test]
    fn version_requires_existing_process() {
        let store = InMemoryGraphStore::new();
        assert!(matches!(store.create_version(new_version("v1")), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn replace_keeps_key_and_swaps_content() {
        let store = InMemoryGraphStore::new();
        store.create_process("demo", "alice").unwrap();
        store.create_version(new_version("v1")).unwrap();
        let mut edited = new_version("v1");
        edited.nodes.push(GraphNode::artifact("b", "b.py"));
        store.replace_version(edited).unwrap();
        let snap = store.fetch_version(&VersionKey::new("demo", "v1")).unwrap();
        assert_eq!(snap.nodes.len(), 3);
        assert_eq!(snap.links.len(), 2);
    }

    #[test]
    fn processes_list_newest_first_with_creator() {
        let store = InMemoryGraphStore::new();
        store.create_process("mixing", "alice").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.create_process("drying", "bob").unwrap();
        let page = store.list_processes(&VersionQuery::default()).unwrap();
        let names: Vec<&str> = page.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["drying", "mixing"]);
        assert_eq!(page.items[1].created_by, "alice");
    }

    #[test]
    fn failed_update_leaves_values_untouched() {
        let store = InMemoryGraphStore::new();
        store.create_process("demo", "alice").unwrap();
        store.create_version(new_version("v1")).unwrap();
        let key = VersionKey::new("demo", "v1");
        let res = store.update_parameters(&key,
                                          &[ParameterUpdate { node_id: "p".into(), value: json!(5) },
                                            ParameterUpdate { node_id: "ghost".into(), value: json!(5) }]);
        assert!(res.is_err());
        let snap = store.fetch_version(&key).unwrap();
        assert_eq!(snap.node("p").and_then(|n| n.as_parameter()).map(|p| p.value.clone()), Some(json!(1)));
    }
}
