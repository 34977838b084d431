use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::NodeId;

/// Tipo de relación entre nodos de una versión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Artifact o parámetro hacia su nodo agrupador.
    Containment,
    /// Proceso/versión hacia el usuario creador.
    CreatedBy,
    /// El destino consume la salida del origen como input.
    DependsOn,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Containment => "containment",
            EdgeKind::CreatedBy => "created_by",
            EdgeKind::DependsOn => "depends_on",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "containment" => Some(EdgeKind::Containment),
            "created_by" => Some(EdgeKind::CreatedBy),
            "depends_on" => Some(EdgeKind::DependsOn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl GraphEdge {
    pub fn new(id: impl Into<String>, source: impl Into<NodeId>, target: impl Into<NodeId>, kind: EdgeKind) -> Self {
        Self { id: id.into(),
               source: source.into(),
               target: target.into(),
               kind,
               properties: Map::new(),
               created_at: None }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// Extremo opuesto a `node_id`, si la arista lo toca.
    pub fn other_end(&self, node_id: &str) -> Option<&NodeId> {
        if self.source == node_id {
            Some(&self.target)
        } else if self.target == node_id {
            Some(&self.source)
        } else {
            None
        }
    }
}
