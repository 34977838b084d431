//! Dependency Scheduler.
//!
//! Ejecuta cada artifact de una versión exactamente una vez, en un orden
//! compatible con las aristas `DependsOn`:
//! - Orden topológico de Kahn sobre todos los artifacts (incluidos los
//!   aislados). La cola de listos se siembra en el orden del snapshot y es
//!   FIFO, lo que fija el desempate.
//! - El orden se calcula completo antes de ejecutar nada: un ciclo produce
//!   `CycleDetected` sin efectos secundarios.
//! - Secuencial: el siguiente artifact no arranca hasta que el anterior
//!   terminó y su resultado quedó propagado.
//! - El primer error aborta la pasada; lo ya propagado queda confirmado.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use crate::errors::{CoreError, CoreResult};
use crate::journal::{ExecutionEventKind, ExecutionJournal};
use crate::model::{VersionKey, VersionSnapshot};
use crate::propagator::ResultPropagator;
use crate::runner::{ArtifactRunner, RunOutput};
use crate::store::GraphStore;

/// Ejecuta un artifact y devuelve su resultado, si lo hay.
pub trait ArtifactExecutor {
    fn execute(&self, file_name: &str, key: &VersionKey) -> CoreResult<Option<RunOutput>>;
}

/// Recibe el resultado de un artifact antes de que sus dependientes queden
/// listos.
pub trait OutputSink {
    fn accept(&self, file_name: &str, key: &VersionKey, output: &RunOutput) -> CoreResult<()>;
}

impl<S: GraphStore> ArtifactExecutor for ArtifactRunner<S> {
    fn execute(&self, file_name: &str, key: &VersionKey) -> CoreResult<Option<RunOutput>> {
        self.run(file_name, key)
    }
}

impl<S: GraphStore> OutputSink for ResultPropagator<S> {
    fn accept(&self, file_name: &str, key: &VersionKey, output: &RunOutput) -> CoreResult<()> {
        self.propagate(file_name, key, &output.value).map(|_| ())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// Artifacts ejecutados, en orden.
    pub order: Vec<String>,
    /// Resultado capturado por artifact (sólo los que produjeron uno).
    pub outputs: IndexMap<String, RunOutput>,
}

/// Orden de Kahn para `artifacts` según los pares `(from, to)`.
///
/// Pares con extremos desconocidos se ignoran. Si quedan artifacts con
/// grado de entrada positivo, hay un ciclo.
pub fn execution_order(artifacts: &[String], pairs: &[(String, String)]) -> CoreResult<Vec<String>> {
    let mut in_degree: IndexMap<&str, usize> = artifacts.iter().map(|a| (a.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in pairs {
        if !in_degree.contains_key(from.as_str()) || !in_degree.contains_key(to.as_str()) {
            log::warn!("dependency {from} -> {to} references an unknown artifact, skipped");
            continue;
        }
        if let Some(d) = in_degree.get_mut(to.as_str()) {
            *d += 1;
        }
        dependents.entry(from.as_str()).or_default().push(to.as_str());
    }

    let mut ready: VecDeque<&str> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(a, _)| *a).collect();
    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(next) = ready.pop_front() {
        order.push(next.to_string());
        for dep in dependents.get(next).into_iter().flatten() {
            if let Some(d) = in_degree.get_mut(dep) {
                *d -= 1;
                if *d == 0 {
                    ready.push_back(*dep);
                }
            }
        }
    }

    if order.len() < in_degree.len() {
        let remaining: Vec<String> =
            in_degree.iter().filter(|(_, d)| **d > 0).map(|(a, _)| a.to_string()).collect();
        return Err(CoreError::CycleDetected { remaining });
    }
    Ok(order)
}

pub struct Scheduler<'a, E, O> {
    executor: &'a E,
    sink: &'a O,
    journal: &'a dyn ExecutionJournal,
}

impl<'a, E: ArtifactExecutor, O: OutputSink> Scheduler<'a, E, O> {
    pub fn new(executor: &'a E, sink: &'a O, journal: &'a dyn ExecutionJournal) -> Self {
        Self { executor, sink, journal }
    }

    /// Una pasada completa sobre los artifacts de `snapshot`.
    pub fn run(&self, snapshot: &VersionSnapshot) -> CoreResult<ExecutionReport> {
        let key = &snapshot.key;
        let artifacts: Vec<String> = snapshot.artifacts().map(|(_, a)| a.file_name.clone()).collect();
        let order = execution_order(&artifacts, &snapshot.dependency_pairs())?;
        log::info!("{key}: executing {} artifact(s)", order.len());
        self.journal.append(key, ExecutionEventKind::PassStarted { order: order.clone() })?;

        let mut report = ExecutionReport::default();
        for file_name in &order {
            self.journal.append(key, ExecutionEventKind::ArtifactStarted { file_name: file_name.clone() })?;
            match self.step(file_name, key) {
                Ok(output) => {
                    log::debug!("{key}: {file_name} finished ({})",
                                output.as_ref().map(|o| o.mode.as_str()).unwrap_or("no output"));
                    self.journal.append(key,
                                        ExecutionEventKind::ArtifactFinished { file_name: file_name.clone(),
                                                                               mode: output.as_ref().map(|o| o.mode),
                                                                               value: output.as_ref().map(|o| o.value.clone()) })?;
                    report.order.push(file_name.clone());
                    if let Some(o) = output {
                        report.outputs.insert(file_name.clone(), o);
                    }
                }
                Err(e) => {
                    log::error!("{key}: {file_name} failed, aborting pass: {e}");
                    let failed = [ExecutionEventKind::ArtifactFailed { file_name: file_name.clone(),
                                                                       error: e.to_string() },
                                  ExecutionEventKind::PassAborted { failed: file_name.clone(),
                                                                    executed: report.order.len() }];
                    for event in failed {
                        // el error del artifact manda sobre el del journal
                        if let Err(je) = self.journal.append(key, event) {
                            log::warn!("{key}: could not journal failure of {file_name}: {je}");
                        }
                    }
                    return Err(e);
                }
            }
        }
        self.journal.append(key, ExecutionEventKind::PassCompleted { executed: report.order.len() })?;
        Ok(report)
    }

    fn step(&self, file_name: &str, key: &VersionKey) -> CoreResult<Option<RunOutput>> {
        let output = self.executor.execute(file_name, key)?;
        if let Some(o) = &output {
            self.sink.accept(file_name, key, o)?;
        }
        Ok(output)
    }
}
