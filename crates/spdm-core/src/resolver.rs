use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CoreError, CoreResult};
use crate::model::{VersionKey, VersionSnapshot};
use crate::store::GraphStore;

/// Input declarado por un artifact con su valor actual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInput {
    pub name: String,
    pub value: Value,
}

/// Lee del store los valores actuales de los inputs de un artifact.
pub struct InputResolver<S> {
    store: S,
}

impl<S: GraphStore> InputResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Inputs del artifact `file_name` en el orden del snapshot. Vacío si no
    /// declara parámetros; `NotFound` si el artifact no está en la versión.
    pub fn resolve_inputs(&self, file_name: &str, key: &VersionKey) -> CoreResult<Vec<ResolvedInput>> {
        let snapshot = self.store.fetch_version(key)?;
        resolve_from_snapshot(&snapshot, file_name)
    }
}

pub fn resolve_from_snapshot(snapshot: &VersionSnapshot, file_name: &str) -> CoreResult<Vec<ResolvedInput>> {
    let artifact = snapshot.artifact_by_file(file_name)
                           .ok_or_else(|| CoreError::not_found(format!("artifact {file_name} in {}", snapshot.key)))?;
    Ok(snapshot.input_parameters_of(&artifact.id)
               .into_iter()
               .map(|(_, p)| ResolvedInput { name: p.name.clone(), value: p.value.clone() })
               .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, GraphEdge, GraphNode, NewVersion, ParameterNode};
    use crate::store::InMemoryGraphStore;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn resolves_current_values_and_skips_output() {
        let store = Arc::new(InMemoryGraphStore::new());
        store.create_process("demo", "alice").unwrap();
        store.create_version(NewVersion::new(VersionKey::new("demo", "v1"),
                                             "alice",
                                             vec![GraphNode::artifact("b", "b.py"),
                                                  GraphNode::parameter("x", ParameterNode::input("x", json!(7))),
                                                  GraphNode::parameter("o", ParameterNode::output("res")),
                                                  GraphNode::artifact("c", "c.py")],
                                             vec![GraphEdge::new("e1", "x", "b", EdgeKind::Containment),
                                                  GraphEdge::new("e2", "b", "o", EdgeKind::Containment)]))
             .unwrap();
        let resolver = InputResolver::new(store.clone());
        let key = VersionKey::new("demo", "v1");
        assert_eq!(resolver.resolve_inputs("b.py", &key).unwrap(),
                   vec![ResolvedInput { name: "x".into(), value: json!(7) }]);
        assert!(resolver.resolve_inputs("c.py", &key).unwrap().is_empty());
        assert!(matches!(resolver.resolve_inputs("zzz.py", &key), Err(CoreError::NotFound(_))));
    }
}
