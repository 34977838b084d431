//! Modelo tipado del grafo de versiones (nodos, aristas, snapshot).

pub mod edge;
pub mod node;
pub mod snapshot;

pub use edge::{EdgeKind, GraphEdge};
pub use node::{ArtifactNode, ArtifactType, GraphNode, GroupNode, NodeData, NodeId, NodeKind, ParamDirection, ParameterNode,
               Position};
pub use snapshot::{ArtifactLink, DependencyLink, NewVersion, ParameterUpdate, ProcessSummary, VersionKey, VersionSnapshot,
                   VersionSummary};
