//! Nodos del grafo de una versión.
//!
//! En lugar de una bolsa de propiedades sin tipo, cada nodo lleva una
//! variante por `kind` ([`NodeData`]) y un sobre común con identidad,
//! posición en el editor y marca de creación. Las propiedades que el motor no
//! interpreta se conservan en `extra` para que el editor las recupere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

pub type NodeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    ProcessRoot,
    VersionRoot,
    Artifact,
    SubgroupLabel,
    Parameter,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::ProcessRoot => "process_root",
            NodeKind::VersionRoot => "version_root",
            NodeKind::Artifact => "artifact",
            NodeKind::SubgroupLabel => "subgroup",
            NodeKind::Parameter => "parameter",
        }
    }
}

/// Rol de un parámetro respecto del artifact que lo contiene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamDirection {
    #[default]
    Input,
    Output,
}

/// Tipo de artifact deducido de la extensión del archivo de respaldo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactType {
    Script,
    Spreadsheet,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactNode {
    pub file_name: String,
    /// Nombre del parámetro que recibe el resultado capturado.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_slot: Option<String>,
}

impl ArtifactNode {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self { file_name: file_name.into(), output_slot: None }
    }

    pub fn artifact_type(&self) -> ArtifactType {
        let ext = Path::new(&self.file_name).extension()
                                            .and_then(|e| e.to_str())
                                            .map(|e| e.to_ascii_lowercase())
                                            .unwrap_or_default();
        match ext.as_str() {
            "py" => ArtifactType::Script,
            "xlsx" => ArtifactType::Spreadsheet,
            other => ArtifactType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterNode {
    pub name: String,
    /// Valor actual; `Null` hasta que se declare o se propague.
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub direction: ParamDirection,
}

impl ParameterNode {
    pub fn input(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value, unit: None, direction: ParamDirection::Input }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: Value::Null, unit: None, direction: ParamDirection::Output }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeData {
    ProcessRoot { process_name: String },
    VersionRoot { version_name: String },
    Artifact(ArtifactNode),
    Subgroup(GroupNode),
    Parameter(ParameterNode),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::ProcessRoot { .. } => NodeKind::ProcessRoot,
            NodeData::VersionRoot { .. } => NodeKind::VersionRoot,
            NodeData::Artifact(_) => NodeKind::Artifact,
            NodeData::Subgroup(_) => NodeKind::SubgroupLabel,
            NodeData::Parameter(_) => NodeKind::Parameter,
        }
    }
}

/// Posición del nodo en el editor gráfico.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Marca asignada por el store al confirmar la versión.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>, data: NodeData) -> Self {
        Self { id: id.into(),
               data,
               parent: None,
               position: None,
               created_at: None,
               extra: Map::new() }
    }

    pub fn artifact(id: impl Into<NodeId>, file_name: impl Into<String>) -> Self {
        Self::new(id, NodeData::Artifact(ArtifactNode::new(file_name)))
    }

    pub fn parameter(id: impl Into<NodeId>, param: ParameterNode) -> Self {
        Self::new(id, NodeData::Parameter(param))
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn as_artifact(&self) -> Option<&ArtifactNode> {
        match &self.data {
            NodeData::Artifact(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterNode> {
        match &self.data {
            NodeData::Parameter(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_parameter_mut(&mut self) -> Option<&mut ParameterNode> {
        match &mut self.data {
            NodeData::Parameter(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifact_type_follows_extension() {
        assert_eq!(ArtifactNode::new("a.py").artifact_type(), ArtifactType::Script);
        assert_eq!(ArtifactNode::new("Book.XLSX").artifact_type(), ArtifactType::Spreadsheet);
        assert_eq!(ArtifactNode::new("run.sh").artifact_type(), ArtifactType::Other("sh".into()));
    }

    #[test]
    fn node_data_is_tagged_by_kind() {
        let n = GraphNode::parameter("p1", ParameterNode::input("x", json!(2.5)));
        let v = serde_json::to_value(&n.data).unwrap();
        assert_eq!(v["kind"], "parameter");
        assert_eq!(v["name"], "x");
        assert_eq!(v["direction"], "input");
        let back: NodeData = serde_json::from_value(v).unwrap();
        assert_eq!(back, n.data);
    }
}
