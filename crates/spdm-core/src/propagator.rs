//! Result Propagator.
//!
//! Escribe el resultado de un artifact en su parámetro de salida y lo copia a
//! los inputs de los artifacts que dependen directamente de él. Todas las
//! escrituras se preparan primero y se confirman con un único
//! `update_parameters`, de modo que el grafo nunca queda a medio propagar.

use indexmap::IndexMap;
use serde_json::Value;

use crate::errors::{CoreError, CoreResult};
use crate::model::{NodeId, ParameterUpdate, VersionKey, VersionSnapshot};
use crate::store::GraphStore;

pub struct ResultPropagator<S> {
    store: S,
}

impl<S: GraphStore> ResultPropagator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Propaga `result` del artifact `file_name` y devuelve las
    /// actualizaciones aplicadas.
    pub fn propagate(&self, file_name: &str, key: &VersionKey, result: &str) -> CoreResult<Vec<ParameterUpdate>> {
        let snapshot = self.store.fetch_version(key)?;
        let updates = stage_updates(&snapshot, file_name, parse_result(result))?;
        if updates.is_empty() {
            log::debug!("{key}: {file_name} has no output slot nor dependents, nothing to propagate");
            return Ok(updates);
        }
        self.store.update_parameters(key, &updates)?;
        log::debug!("{key}: {file_name} propagated to {} parameter(s)", updates.len());
        Ok(updates)
    }
}

/// Texto capturado a valor JSON: número o booleano cuando se puede, si no
/// string.
pub fn parse_result(raw: &str) -> Value {
    let t = raw.trim();
    if let Ok(i) = t.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = t.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return Value::Number(n);
    }
    match t {
        "True" | "true" => Value::Bool(true),
        "False" | "false" => Value::Bool(false),
        _ => Value::String(t.to_string()),
    }
}

/// Actualizaciones de parámetros para el resultado de `file_name`, sin
/// aplicarlas.
pub fn stage_updates(snapshot: &VersionSnapshot, file_name: &str, value: Value) -> CoreResult<Vec<ParameterUpdate>> {
    let artifact = snapshot.artifact_by_file(file_name)
                           .ok_or_else(|| CoreError::not_found(format!("artifact {file_name} in {}", snapshot.key)))?;
    let mut staged: IndexMap<NodeId, Value> = IndexMap::new();
    let output = snapshot.output_parameter_of(&artifact.id);
    if let Some((node, _)) = output {
        staged.insert(node.id.clone(), value.clone());
    }

    for link in snapshot.dependency_links().into_iter().filter(|l| l.producer == file_name) {
        if let Some(target) = &link.target_param {
            staged.insert(target.clone(), value.clone());
            continue;
        }
        // extremo artifact: input del dependiente con el nombre de la salida
        let slot_name = link.source_param
                            .as_deref()
                            .and_then(|id| snapshot.node(id))
                            .and_then(|n| n.as_parameter())
                            .or_else(|| output.map(|(_, p)| p))
                            .map(|p| p.name.clone())
                            .or_else(|| artifact.as_artifact().and_then(|a| a.output_slot.clone()));
        let Some(consumer) = snapshot.artifact_by_file(&link.consumer) else { continue };
        let target = slot_name.as_deref().and_then(|name| {
                                             snapshot.input_parameters_of(&consumer.id)
                                                     .into_iter()
                                                     .find(|(_, p)| p.name == name)
                                                     .map(|(n, _)| n.id.clone())
                                         });
        match target {
            Some(id) => {
                staged.insert(id, value.clone());
            }
            None => log::warn!("{}: {} depends on {file_name} but declares no matching input, skipped",
                               snapshot.key,
                               link.consumer),
        }
    }
    Ok(staged.into_iter().map(|(node_id, value)| ParameterUpdate { node_id, value }).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, GraphEdge, GraphNode, NewVersion, NodeData, ParameterNode};
    use chrono::Utc;
    use serde_json::json;

    fn snapshot(edges: Vec<GraphEdge>) -> VersionSnapshot {
        let nodes = vec![GraphNode::artifact("a", "a.py"),
                         GraphNode::parameter("a_out", ParameterNode::output("x")),
                         GraphNode::artifact("b", "b.py"),
                         GraphNode::parameter("b_x", ParameterNode::input("x", json!(0))),
                         GraphNode::artifact("c", "c.py"),
                         GraphNode::parameter("c_z", ParameterNode::input("z", json!(0)))];
        let mut all = vec![GraphEdge::new("k1", "a", "a_out", EdgeKind::Containment),
                           GraphEdge::new("k2", "b_x", "b", EdgeKind::Containment),
                           GraphEdge::new("k3", "c_z", "c", EdgeKind::Containment)];
        all.extend(edges);
        NewVersion::new(VersionKey::new("demo", "v1"), "alice", nodes, all).into_snapshot(Utc::now())
    }

    #[test]
    fn artifact_edge_matches_input_by_output_name() {
        let s = snapshot(vec![GraphEdge::new("d1", "a", "b", EdgeKind::DependsOn),
                              GraphEdge::new("d2", "a", "c", EdgeKind::DependsOn)]);
        let ups = stage_updates(&s, "a.py", json!(42)).unwrap();
        let ids: Vec<&str> = ups.iter().map(|u| u.node_id.as_str()).collect();
        // c no declara `x`: se omite
        assert_eq!(ids, vec!["a_out", "b_x"]);
    }

    fn without_output_node(slot: Option<&str>) -> NewVersion {
        let mut producer = GraphNode::artifact("a", "a.py");
        if let NodeData::Artifact(a) = &mut producer.data {
            a.output_slot = slot.map(str::to_string);
        }
        NewVersion::new(VersionKey::new("demo", "v1"),
                        "alice",
                        vec![producer,
                             GraphNode::artifact("b", "b.py"),
                             GraphNode::parameter("b_x", ParameterNode::input("x", json!(0)))],
                        vec![GraphEdge::new("k1", "b_x", "b", EdgeKind::Containment),
                             GraphEdge::new("d1", "a", "b", EdgeKind::DependsOn)])
    }

    #[test]
    fn output_slot_forwards_without_an_output_node() {
        let s = without_output_node(Some("x")).into_snapshot(Utc::now());
        let ups = stage_updates(&s, "a.py", json!(42)).unwrap();
        assert_eq!(ups, vec![ParameterUpdate { node_id: "b_x".into(), value: json!(42) }]);
    }

    #[test]
    fn producer_without_any_output_name_is_rejected_up_front() {
        assert!(matches!(without_output_node(None).validate(), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn parameter_edge_targets_that_parameter() {
        let s = snapshot(vec![GraphEdge::new("d1", "a_out", "c_z", EdgeKind::DependsOn)]);
        let ups = stage_updates(&s, "a.py", json!("hi")).unwrap();
        assert_eq!(ups.len(), 2);
        assert_eq!(ups[1], ParameterUpdate { node_id: "c_z".into(), value: json!("hi") });
    }

    #[test]
    fn result_text_is_typed_when_possible() {
        assert_eq!(parse_result(" 42\n"), json!(42));
        assert_eq!(parse_result("2.5"), json!(2.5));
        assert_eq!(parse_result("True"), json!(true));
        assert_eq!(parse_result("hello"), json!("hello"));
    }
}
