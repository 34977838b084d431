//! Snapshot inmutable de una versión.
//!
//! Un `VersionSnapshot` agrupa todos los nodos y aristas que pertenecen a
//! `(process, version)`. El snapshot sólo se modifica a través de
//! [`ParameterUpdate`]s (valor actual de un nodo parámetro); cualquier otro
//! cambio implica reemplazar la versión completa.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::{ArtifactNode, EdgeKind, GraphEdge, GraphNode, NodeId, ParamDirection, ParameterNode};
use crate::errors::{CoreError, CoreResult};
use crate::hashing::hash_value;

/// Identidad de una versión: `(process, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionKey {
    pub process: String,
    pub version: String,
}

impl VersionKey {
    pub fn new(process: impl Into<String>, version: impl Into<String>) -> Self {
        Self { process: process.into(), version: version.into() }
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.process, self.version)
    }
}

/// Vínculo que el store crea para cada artifact: proceso dueño y creador.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLink {
    pub node_id: NodeId,
    pub process: String,
    pub created_by: String,
}

/// Nuevo valor para el slot de un nodo parámetro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub node_id: NodeId,
    pub value: Value,
}

/// Arista `DependsOn` resuelta a nivel de artifacts.
///
/// Los extremos pueden ser artifacts o parámetros; en el segundo caso
/// `source_param`/`target_param` conservan el nodo parámetro concreto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyLink {
    pub edge_id: String,
    pub producer: String,
    pub consumer: String,
    pub source_param: Option<NodeId>,
    pub target_param: Option<NodeId>,
}

/// Grafo a confirmar como nueva versión.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVersion {
    pub key: VersionKey,
    pub created_by: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl NewVersion {
    pub fn new(key: VersionKey, created_by: impl Into<String>, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { key, created_by: created_by.into(), nodes, edges }
    }

    /// Invariantes estructurales previas a cualquier escritura.
    pub fn validate(&self) -> CoreResult<()> {
        if self.key.process.trim().is_empty() || self.key.version.trim().is_empty() {
            return Err(CoreError::validation("process and version names are required"));
        }
        validate_graph(&self.nodes, &self.edges)
    }

    /// Estampa `created_at` en nodos y aristas y registra los vínculos de
    /// cada artifact con el proceso y el creador.
    pub fn into_snapshot(self, now: DateTime<Utc>) -> VersionSnapshot {
        let NewVersion { key, created_by, mut nodes, mut edges } = self;
        for n in nodes.iter_mut() {
            n.created_at = Some(now);
        }
        for e in edges.iter_mut() {
            e.created_at = Some(now);
        }
        let links = nodes.iter()
                         .filter(|n| n.as_artifact().is_some())
                         .map(|n| ArtifactLink { node_id: n.id.clone(),
                                                 process: key.process.clone(),
                                                 created_by: created_by.clone() })
                         .collect();
        VersionSnapshot { key,
                          created_by: Some(created_by),
                          created_at: Some(now),
                          nodes,
                          edges,
                          links }
    }
}

/// Identidades únicas, aristas con extremos conocidos y artifacts con un
/// nombre de archivo único dentro de la versión.
pub(crate) fn validate_graph(nodes: &[GraphNode], edges: &[GraphEdge]) -> CoreResult<()> {
    let mut ids = HashSet::new();
    let mut files = HashSet::new();
    for n in nodes {
        if n.id.is_empty() {
            return Err(CoreError::validation("node without id"));
        }
        if !ids.insert(n.id.as_str()) {
            return Err(CoreError::validation(format!("duplicate node id {}", n.id)));
        }
        if let Some(a) = n.as_artifact() {
            if a.file_name.trim().is_empty() {
                return Err(CoreError::validation(format!("artifact {} has no file name", n.id)));
            }
            if !files.insert(a.file_name.as_str()) {
                return Err(CoreError::validation(format!("artifact file {} declared twice", a.file_name)));
            }
        }
    }
    let mut edge_ids = HashSet::new();
    for e in edges {
        if !edge_ids.insert(e.id.as_str()) {
            return Err(CoreError::validation(format!("duplicate edge id {}", e.id)));
        }
        if !ids.contains(e.source.as_str()) || !ids.contains(e.target.as_str()) {
            return Err(CoreError::validation(format!("edge {} references an unknown node", e.id)));
        }
    }
    validate_dependency_sources(nodes, edges)
}

/// Una dependencia artifact → artifact necesita un nombre de salida en el
/// productor (parámetro `Output` u `output_slot`) para saber qué input llenar.
fn validate_dependency_sources(nodes: &[GraphNode], edges: &[GraphEdge]) -> CoreResult<()> {
    let by_id: HashMap<&str, &GraphNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let declares_output = |artifact: &GraphNode| {
        let has_slot = artifact.as_artifact().map(|a| a.output_slot.is_some()).unwrap_or(false);
        has_slot
        || edges.iter()
                .filter(|e| e.kind == EdgeKind::Containment)
                .filter_map(|e| e.other_end(&artifact.id))
                .filter_map(|id| by_id.get(id.as_str()).and_then(|n| n.as_parameter()))
                .any(|p| p.direction == ParamDirection::Output)
    };
    for e in edges.iter().filter(|e| e.kind == EdgeKind::DependsOn) {
        let (Some(src), Some(tgt)) = (by_id.get(e.source.as_str()), by_id.get(e.target.as_str())) else { continue };
        if src.as_artifact().is_some() && tgt.as_artifact().is_some() && !declares_output(*src) {
            return Err(CoreError::validation(format!("dependency {} starts at artifact {} which declares no output \
                                                      parameter nor output slot",
                                                     e.id, src.id)));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub key: VersionKey,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub links: Vec<ArtifactLink>,
}

impl VersionSnapshot {
    pub fn empty(key: VersionKey) -> Self {
        Self { key,
               created_by: None,
               created_at: None,
               nodes: vec![],
               edges: vec![],
               links: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Artifacts en el orden en que fueron declarados.
    pub fn artifacts(&self) -> impl Iterator<Item = (&GraphNode, &ArtifactNode)> {
        self.nodes.iter().filter_map(|n| n.as_artifact().map(|a| (n, a)))
    }

    pub fn artifact_by_file(&self, file_name: &str) -> Option<&GraphNode> {
        self.artifacts().find(|(_, a)| a.file_name == file_name).map(|(n, _)| n)
    }

    /// Parámetros conectados por `Containment` (en cualquier dirección) al
    /// nodo `artifact_id`, en orden de declaración.
    pub fn parameters_of(&self, artifact_id: &str) -> Vec<(&GraphNode, &ParameterNode)> {
        let connected: HashSet<&str> = self.edges
                                           .iter()
                                           .filter(|e| e.kind == EdgeKind::Containment)
                                           .filter_map(|e| e.other_end(artifact_id))
                                           .map(|id| id.as_str())
                                           .collect();
        self.nodes
            .iter()
            .filter(|n| connected.contains(n.id.as_str()))
            .filter_map(|n| n.as_parameter().map(|p| (n, p)))
            .collect()
    }

    /// Parámetro designado como salida: dirección `Output` o, en su
    /// defecto, el que coincide con `output_slot` del artifact.
    pub fn output_parameter_of(&self, artifact_id: &str) -> Option<(&GraphNode, &ParameterNode)> {
        let params = self.parameters_of(artifact_id);
        if let Some(found) = params.iter().find(|(_, p)| p.direction == ParamDirection::Output) {
            return Some(*found);
        }
        let slot = self.node(artifact_id)?.as_artifact()?.output_slot.as_deref()?;
        params.into_iter().find(|(_, p)| p.name == slot)
    }

    pub fn input_parameters_of(&self, artifact_id: &str) -> Vec<(&GraphNode, &ParameterNode)> {
        let output_id = self.output_parameter_of(artifact_id).map(|(n, _)| n.id.clone());
        self.parameters_of(artifact_id)
            .into_iter()
            .filter(|(n, p)| p.direction == ParamDirection::Input && Some(&n.id) != output_id.as_ref())
            .collect()
    }

    /// Artifact dueño de `node_id`: el propio nodo si es un artifact, o el
    /// artifact conectado por `Containment` si es un parámetro.
    pub fn owner_artifact(&self, node_id: &str) -> Option<&GraphNode> {
        let node = self.node(node_id)?;
        if node.as_artifact().is_some() {
            return Some(node);
        }
        node.as_parameter()?;
        self.edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Containment)
            .filter_map(|e| e.other_end(node_id))
            .filter_map(|id| self.node(id))
            .find(|n| n.as_artifact().is_some())
    }

    /// Aristas `DependsOn` resueltas a pares productor/consumidor.
    ///
    /// Las aristas cuyo extremo no pertenece a ningún artifact se ignoran.
    pub fn dependency_links(&self) -> Vec<DependencyLink> {
        let mut out = Vec::new();
        for e in self.edges.iter().filter(|e| e.kind == EdgeKind::DependsOn) {
            let (Some(from), Some(to)) = (self.owner_artifact(&e.source), self.owner_artifact(&e.target)) else {
                log::warn!("{}: dependency edge {} has an endpoint outside any artifact, skipped", self.key, e.id);
                continue;
            };
            let (Some(producer), Some(consumer)) = (from.as_artifact(), to.as_artifact()) else { continue };
            let param_end = |id: &str| self.node(id).and_then(|n| n.as_parameter()).map(|_| id.to_string());
            out.push(DependencyLink { edge_id: e.id.clone(),
                                      producer: producer.file_name.clone(),
                                      consumer: consumer.file_name.clone(),
                                      source_param: param_end(&e.source),
                                      target_param: param_end(&e.target) });
        }
        out
    }

    /// Pares distintos `(from, to)` por nombre de archivo, en orden de
    /// primera aparición.
    pub fn dependency_pairs(&self) -> Vec<(String, String)> {
        let pairs: IndexSet<(String, String)> =
            self.dependency_links().into_iter().map(|l| (l.producer, l.consumer)).collect();
        pairs.into_iter().collect()
    }

    /// Aplica todas las actualizaciones o ninguna.
    pub fn apply_parameter_updates(&mut self, updates: &[ParameterUpdate]) -> CoreResult<()> {
        for u in updates {
            let is_param = self.node(&u.node_id).map(|n| n.as_parameter().is_some()).unwrap_or(false);
            if !is_param {
                return Err(CoreError::not_found(format!("parameter node {} in {}", u.node_id, self.key)));
            }
        }
        for u in updates {
            if let Some(p) = self.nodes
                                 .iter_mut()
                                 .find(|n| n.id == u.node_id)
                                 .and_then(|n| n.as_parameter_mut())
            {
                p.value = u.value.clone();
            }
        }
        Ok(())
    }

    /// Huella del contenido del grafo (ignora marcas de tiempo y orden).
    pub fn content_fingerprint(&self) -> String {
        let mut nodes: Vec<GraphNode> = self.nodes.clone();
        nodes.iter_mut().for_each(|n| n.created_at = None);
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let mut edges: Vec<GraphEdge> = self.edges.clone();
        edges.iter_mut().for_each(|e| e.created_at = None);
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        hash_value(&json!({ "nodes": nodes, "edges": edges }))
    }
}

/// Resumen de una versión para listados.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub key: VersionKey,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Resumen de un proceso para listados.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
