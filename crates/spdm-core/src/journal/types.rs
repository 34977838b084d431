//! Eventos de una pasada de ejecución.
//!
//! Rol en el flujo:
//! - El scheduler emite un evento por transición (inicio de pasada, inicio y
//!   fin de cada artifact, cierre o aborto).
//! - El journal permite auditar qué se ejecutó y con qué resultado sin leer
//!   el grafo, ya que los valores propagados se sobreescriben.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::VersionKey;
use crate::runner::OutputMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEventKind {
    /// Orden ya calculado (sin ciclos); ningún artifact ejecutado aún.
    PassStarted { order: Vec<String> },
    ArtifactStarted { file_name: String },
    /// `mode`/`value` vacíos cuando el artifact no produjo resultado.
    ArtifactFinished {
        file_name: String,
        mode: Option<OutputMode>,
        value: Option<String>,
    },
    ArtifactFailed { file_name: String, error: String },
    PassCompleted { executed: usize },
    /// La pasada se detuvo; lo ya propagado queda confirmado.
    PassAborted { failed: String, executed: usize },
}

impl ExecutionEventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ExecutionEventKind::PassStarted { .. } => "PassStarted",
            ExecutionEventKind::ArtifactStarted { .. } => "ArtifactStarted",
            ExecutionEventKind::ArtifactFinished { .. } => "ArtifactFinished",
            ExecutionEventKind::ArtifactFailed { .. } => "ArtifactFailed",
            ExecutionEventKind::PassCompleted { .. } => "PassCompleted",
            ExecutionEventKind::PassAborted { .. } => "PassAborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub seq: u64,
    pub key: VersionKey,
    pub kind: ExecutionEventKind,
    pub ts: DateTime<Utc>,
}
