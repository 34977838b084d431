//! Formato de intercambio con el editor gráfico.
//!
//! Un nodo es `{group:"nodes", data:{id, label, parent?, properties}, position}`
//! y una arista `{group:"edges", data:{id, source, target, label, properties}}`.
//! La importación traduce labels y propiedades (incluidos los alias heredados
//! `Label1..3`, `sublabel`, `key1..key3`) al modelo tipado; la exportación
//! hace el camino inverso con los labels canónicos.
//!
//! `properties.position` viaja como string JSON (`"{\"x\":1.0,\"y\":2.0}"`)
//! además del campo `position` del elemento.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{labels, relations};
use crate::errors::{CoreError, CoreResult};
use crate::model::snapshot::validate_graph;
use crate::model::{ArtifactNode, EdgeKind, GraphEdge, GraphNode, GroupNode, NodeData, ParamDirection, ParameterNode,
                   Position, VersionSnapshot};

const PROP_POSITION: &str = "position";
const PROP_CREATED_AT: &str = "createdAt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "group")]
pub enum ExchangeElement {
    #[serde(rename = "nodes")]
    Node {
        data: NodeElement,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Position>,
    },
    #[serde(rename = "edges")]
    Edge { data: EdgeElement },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    #[serde(default)]
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeElement {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Lee una lista de elementos desde JSON arbitrario (p. ej. el cuerpo de una
/// petición).
pub fn parse_elements(raw: Value) -> CoreResult<Vec<ExchangeElement>> {
    serde_json::from_value(raw).map_err(|e| CoreError::validation(format!("malformed graph element: {e}")))
}

/// Convierte elementos del editor en nodos y aristas tipados.
pub fn import_elements(elements: Vec<ExchangeElement>) -> CoreResult<(Vec<GraphNode>, Vec<GraphEdge>)> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for el in elements {
        match el {
            ExchangeElement::Node { data, position } => nodes.push(import_node(data, position)?),
            ExchangeElement::Edge { data } => edges.push(import_edge(data)?),
        }
    }
    validate_graph(&nodes, &edges)?;
    Ok((nodes, edges))
}

fn import_node(el: NodeElement, position: Option<Position>) -> CoreResult<GraphNode> {
    let NodeElement { id, label, parent, mut properties } = el;
    if id.trim().is_empty() {
        return Err(CoreError::validation(format!("{label} node without id")));
    }
    properties.remove(PROP_CREATED_AT);
    let embedded = match properties.remove(PROP_POSITION) {
        Some(Value::String(s)) => serde_json::from_str::<Position>(&s).map(Some),
        Some(v) => serde_json::from_value::<Position>(v).map(Some),
        None => Ok(None),
    };
    let embedded = embedded.unwrap_or_else(|e| {
                               warn!("node {id}: ignoring unparsable position ({e})");
                               None
                           });
    let props = &mut properties;
    let data = match label.as_str() {
        labels::PROCESS => NodeData::ProcessRoot { process_name: take_str(props, &["name", "processName", "key1"])
                                                       .unwrap_or_else(|| id.clone()) },
        labels::VERSION | labels::LEGACY_VERSION => {
            NodeData::VersionRoot { version_name: take_str(props, &["name", "versionName", "key1"])
                                        .unwrap_or_else(|| id.clone()) }
        }
        labels::ARTIFACT | labels::LEGACY_ARTIFACT => {
            let file_name = take_str(props, &["fileName", "file_name", "sublabel"])
                .ok_or_else(|| CoreError::validation(format!("artifact {id} has no file name")))?;
            let output_slot = take_str(props, &["outputSlot", "output_slot"]);
            NodeData::Artifact(ArtifactNode { file_name, output_slot })
        }
        labels::SUBGROUP | labels::LEGACY_SUBGROUP => {
            NodeData::Subgroup(GroupNode { label: take_str(props, &["label", "name", "sublabel"]).unwrap_or_default() })
        }
        labels::PARAMETER | labels::LEGACY_PARAMETER => {
            let name = take_str(props, &["name", "key1"])
                .ok_or_else(|| CoreError::validation(format!("parameter {id} has no name")))?;
            let value = take(props, &["value", "key2"]).unwrap_or(Value::Null);
            let unit = take_str(props, &["unit", "key3"]);
            let direction = match take_str(props, &["direction"]).as_deref() {
                None | Some("input") => ParamDirection::Input,
                Some("output") => ParamDirection::Output,
                Some(other) => {
                    return Err(CoreError::validation(format!("parameter {id} has unknown direction {other}")));
                }
            };
            NodeData::Parameter(ParameterNode { name, value, unit, direction })
        }
        other => return Err(CoreError::validation(format!("unknown node label {other}"))),
    };
    Ok(GraphNode { id,
                   data,
                   parent: parent.filter(|p| !p.is_empty()),
                   position: position.or(embedded),
                   created_at: None,
                   extra: properties })
}

fn import_edge(el: EdgeElement) -> CoreResult<GraphEdge> {
    let EdgeElement { id, source, target, label, mut properties } = el;
    if id.trim().is_empty() {
        return Err(CoreError::validation(format!("{label} edge without id")));
    }
    let kind = edge_kind_for(&label).ok_or_else(|| CoreError::validation(format!("unknown edge label {label}")))?;
    properties.remove(PROP_CREATED_AT);
    Ok(GraphEdge { id,
                   source,
                   target,
                   kind,
                   properties,
                   created_at: None })
}

fn edge_kind_for(label: &str) -> Option<EdgeKind> {
    match label {
        relations::CONTAINMENT => Some(EdgeKind::Containment),
        relations::CREATED_BY => Some(EdgeKind::CreatedBy),
        relations::DEPENDS_ON => Some(EdgeKind::DependsOn),
        l if relations::LEGACY_CONTAINMENT.contains(&l) => Some(EdgeKind::Containment),
        l if relations::LEGACY_DEPENDS_ON.contains(&l) => Some(EdgeKind::DependsOn),
        _ => None,
    }
}

fn take(props: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter().find_map(|k| props.remove(*k))
}

fn take_str(props: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    take(props, keys).and_then(|v| match v {
                         Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                         Value::Number(n) => Some(n.to_string()),
                         _ => None,
                     })
}

/// Elementos del editor para un snapshot, con labels canónicos.
pub fn export_snapshot(snapshot: &VersionSnapshot) -> Vec<ExchangeElement> {
    let mut out = Vec::with_capacity(snapshot.nodes.len() + snapshot.edges.len());
    for n in &snapshot.nodes {
        out.push(export_node(n));
    }
    for e in &snapshot.edges {
        let mut properties = e.properties.clone();
        if let Some(ts) = e.created_at {
            properties.insert(PROP_CREATED_AT.into(), Value::String(ts.to_rfc3339()));
        }
        let label = match e.kind {
            EdgeKind::Containment => relations::CONTAINMENT,
            EdgeKind::CreatedBy => relations::CREATED_BY,
            EdgeKind::DependsOn => relations::DEPENDS_ON,
        };
        out.push(ExchangeElement::Edge { data: EdgeElement { id: e.id.clone(),
                                                             source: e.source.clone(),
                                                             target: e.target.clone(),
                                                             label: label.to_string(),
                                                             properties } });
    }
    out
}

fn export_node(n: &GraphNode) -> ExchangeElement {
    let mut properties = n.extra.clone();
    let label = match &n.data {
        NodeData::ProcessRoot { process_name } => {
            properties.insert("name".into(), Value::String(process_name.clone()));
            labels::PROCESS
        }
        NodeData::VersionRoot { version_name } => {
            properties.insert("name".into(), Value::String(version_name.clone()));
            labels::VERSION
        }
        NodeData::Artifact(a) => {
            properties.insert("fileName".into(), Value::String(a.file_name.clone()));
            if let Some(slot) = &a.output_slot {
                properties.insert("outputSlot".into(), Value::String(slot.clone()));
            }
            labels::ARTIFACT
        }
        NodeData::Subgroup(g) => {
            properties.insert("label".into(), Value::String(g.label.clone()));
            labels::SUBGROUP
        }
        NodeData::Parameter(p) => {
            properties.insert("name".into(), Value::String(p.name.clone()));
            properties.insert("value".into(), p.value.clone());
            if let Some(unit) = &p.unit {
                properties.insert("unit".into(), Value::String(unit.clone()));
            }
            let dir = match p.direction {
                ParamDirection::Input => "input",
                ParamDirection::Output => "output",
            };
            properties.insert("direction".into(), Value::String(dir.into()));
            labels::PARAMETER
        }
    };
    if let Some(pos) = n.position {
        if let Ok(encoded) = serde_json::to_string(&pos) {
            properties.insert(PROP_POSITION.into(), Value::String(encoded));
        }
    }
    if let Some(ts) = n.created_at {
        properties.insert(PROP_CREATED_AT.into(), Value::String(ts.to_rfc3339()));
    }
    ExchangeElement::Node { data: NodeElement { id: n.id.clone(),
                                                label: label.to_string(),
                                                parent: n.parent.clone(),
                                                properties },
                            position: n.position }
}
