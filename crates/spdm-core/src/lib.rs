//! spdm-core: store de snapshots de versiones y motor de ejecución por
//! dependencias.
//!
//! Módulos:
//! - `model`: grafo tipado (nodos por `kind`, aristas, snapshot).
//! - `exchange`: formato de elementos del editor gráfico.
//! - `store`: trait `GraphStore` + backend en memoria.
//! - `resolver` / `runner` / `propagator` / `scheduler`: pipeline de
//!   ejecución.
//! - `journal`: eventos de ejecución append-only.
//! - `service`: composition root.
pub mod config;
pub mod constants;
pub mod errors;
pub mod exchange;
pub mod hashing;
pub mod journal;
pub mod model;
pub mod propagator;
pub mod resolver;
pub mod runner;
pub mod scheduler;
pub mod service;
pub mod store;

pub use config::RunnerConfig;
pub use errors::{classify_error, CoreError, CoreResult, ErrorClass};
pub use exchange::{export_snapshot, import_elements, parse_elements, ExchangeElement};
pub use journal::{ExecutionEvent, ExecutionEventKind, ExecutionJournal, InMemoryExecutionJournal};
pub use model::{EdgeKind, GraphEdge, GraphNode, NewVersion, NodeData, ParameterNode, ParameterUpdate, ProcessSummary,
                VersionKey, VersionSnapshot, VersionSummary};
pub use propagator::ResultPropagator;
pub use resolver::{InputResolver, ResolvedInput};
pub use runner::{ArtifactRunner, OutputMode, RunOutput};
pub use scheduler::{execution_order, ArtifactExecutor, ExecutionReport, OutputSink, Scheduler};
pub use service::{CreateVersionRequest, ExecuteRequest, VersionService, VersionView};
pub use store::{GraphStore, InMemoryGraphStore, Listed, Page, VersionQuery};
