//! Composition root.
//!
//! `VersionService` cablea Store → Resolver → Runner → Propagator →
//! Scheduler por constructor y expone las operaciones de versiones con el
//! formato de intercambio del editor. Los nombres recibidos se recortan y un
//! nombre vacío es un `ValidationError`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RunnerConfig;
use crate::errors::{CoreError, CoreResult};
use crate::exchange::{export_snapshot, import_elements, ExchangeElement};
use crate::journal::{ExecutionEvent, ExecutionJournal};
use crate::model::{NewVersion, ProcessSummary, VersionKey, VersionSnapshot, VersionSummary};
use crate::propagator::ResultPropagator;
use crate::runner::ArtifactRunner;
use crate::scheduler::{ExecutionReport, Scheduler};
use crate::store::{GraphStore, Page, VersionQuery};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersionRequest {
    pub version_name: String,
    #[serde(default)]
    pub elements: Vec<ExchangeElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub process_name: String,
    pub version_name: String,
}

/// Versión tal como la consume el editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionView {
    pub process_name: String,
    pub version_name: String,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub elements: Vec<ExchangeElement>,
}

impl From<&VersionSnapshot> for VersionView {
    fn from(s: &VersionSnapshot) -> Self {
        Self { process_name: s.key.process.clone(),
               version_name: s.key.version.clone(),
               created_by: s.created_by.clone(),
               created_at: s.created_at,
               elements: export_snapshot(s) }
    }
}

pub struct VersionService<S, J> {
    store: S,
    journal: J,
    runner: ArtifactRunner<S>,
    propagator: ResultPropagator<S>,
}

fn required(what: &str, value: &str) -> CoreResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(CoreError::validation(format!("{what} is required")));
    }
    Ok(v.to_string())
}

impl<S, J> VersionService<S, J>
    where S: GraphStore + Clone,
          J: ExecutionJournal
{
    pub fn new(store: S, journal: J, config: RunnerConfig) -> Self {
        Self { runner: ArtifactRunner::new(store.clone(), config),
               propagator: ResultPropagator::new(store.clone()),
               store,
               journal }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn runner_config(&self) -> &RunnerConfig {
        self.runner.config()
    }

    pub fn create_process(&self, name: &str, creator: &str) -> CoreResult<()> {
        let name = required("process name", name)?;
        let creator = required("creator", creator)?;
        self.store.create_process(&name, &creator)
    }

    fn new_version(&self, process: &str, req: CreateVersionRequest, creator: &str) -> CoreResult<NewVersion> {
        let process = required("process name", process)?;
        let version = required("version name", &req.version_name)?;
        let creator = required("creator", creator)?;
        let (nodes, edges) = import_elements(req.elements)?;
        Ok(NewVersion::new(VersionKey::new(process, version), creator, nodes, edges))
    }

    pub fn create_version(&self, process: &str, req: CreateVersionRequest, creator: &str) -> CoreResult<VersionView> {
        let nv = self.new_version(process, req, creator)?;
        let key = nv.key.clone();
        let snapshot = self.store.create_version(nv)?;
        log::info!("version {key} created");
        Ok(VersionView::from(&snapshot))
    }

    /// Reemplaza el subgrafo completo de una versión existente.
    pub fn edit_version(&self, process: &str, req: CreateVersionRequest, creator: &str) -> CoreResult<VersionView> {
        let nv = self.new_version(process, req, creator)?;
        let key = nv.key.clone();
        let snapshot = self.store.replace_version(nv)?;
        log::info!("version {key} replaced");
        Ok(VersionView::from(&snapshot))
    }

    pub fn delete_version(&self, process: &str, version: &str) -> CoreResult<bool> {
        let key = VersionKey::new(required("process name", process)?, required("version name", version)?);
        self.store.delete_version(&key)
    }

    pub fn fetch_version(&self, process: &str, version: &str) -> CoreResult<VersionView> {
        let key = VersionKey::new(required("process name", process)?, required("version name", version)?);
        Ok(VersionView::from(&self.store.fetch_version(&key)?))
    }

    pub fn fetch_latest_version(&self, process: &str) -> CoreResult<VersionView> {
        let process = required("process name", process)?;
        Ok(VersionView::from(&self.store.fetch_latest_version(&process)?))
    }

    pub fn list_versions(&self, process: &str, query: &VersionQuery) -> CoreResult<Page<VersionSummary>> {
        let process = required("process name", process)?;
        if !self.store.process_exists(&process)? {
            return Err(CoreError::not_found(format!("process {process}")));
        }
        self.store.list_versions(&process, query)
    }

    pub fn list_processes(&self, query: &VersionQuery) -> CoreResult<Page<ProcessSummary>> {
        self.store.list_processes(query)
    }

    /// Ejecuta todos los artifacts de la versión en orden de dependencias.
    pub fn execute_version(&self, req: &ExecuteRequest) -> CoreResult<ExecutionReport> {
        let key = VersionKey::new(required("process name", &req.process_name)?,
                                  required("version name", &req.version_name)?);
        let snapshot = self.store.fetch_version(&key)?;
        if snapshot.created_at.is_none() {
            return Err(CoreError::not_found(format!("version {key}")));
        }
        Scheduler::new(&self.runner, &self.propagator, &self.journal).run(&snapshot)
    }

    pub fn execution_log(&self, process: &str, version: &str) -> CoreResult<Vec<ExecutionEvent>> {
        let key = VersionKey::new(required("process name", process)?, required("version name", version)?);
        self.journal.list(&key)
    }
}
