//! spdm-rust
//!
//! Fachada del workspace:
//! - `engine`: modelo de grafo, store en memoria y pipeline de ejecución.
//! - `persistence`: backends Postgres de `GraphStore` y `ExecutionJournal`.
//!
//! Los escenarios de punta a punta viven en `tests/`.

pub use spdm_core as engine;
pub use spdm_persistence as persistence;

pub use spdm_core::{CoreError, CoreResult, CreateVersionRequest, ExecuteRequest, ExecutionReport, GraphStore,
                    InMemoryExecutionJournal, InMemoryGraphStore, RunnerConfig, VersionService, VersionView};

use std::sync::Arc;

/// Servicio completo sobre los backends en memoria.
pub type InMemoryService = VersionService<Arc<InMemoryGraphStore>, InMemoryExecutionJournal>;

pub fn in_memory_service(config: RunnerConfig) -> InMemoryService {
    VersionService::new(Arc::new(InMemoryGraphStore::new()), InMemoryExecutionJournal::new(), config)
}
