use proptest::prelude::*;
use std::sync::Mutex;

use spdm_core::journal::{ExecutionEvent, ExecutionEventKind, ExecutionJournal, InMemoryExecutionJournal};
use spdm_core::model::{EdgeKind, GraphEdge, GraphNode, NewVersion, VersionKey, VersionSnapshot};
use spdm_core::scheduler::{execution_order, ArtifactExecutor, OutputSink, Scheduler};
use spdm_core::{CoreError, CoreResult, OutputMode, RunOutput};

/// Registra el orden de ejecución y falla en el artifact indicado.
#[derive(Default)]
struct Recorder {
    executed: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl ArtifactExecutor for Recorder {
    fn execute(&self, file_name: &str, _key: &VersionKey) -> CoreResult<Option<RunOutput>> {
        if self.fail_on.as_deref() == Some(file_name) {
            return Err(CoreError::ExecutionError { artifact: file_name.into(), message: "boom".into() });
        }
        self.executed.lock().unwrap().push(file_name.to_string());
        Ok(Some(RunOutput { mode: OutputMode::Print, value: file_name.to_string() }))
    }
}

#[derive(Default)]
struct Sink {
    accepted: Mutex<Vec<String>>,
}

impl OutputSink for Sink {
    fn accept(&self, file_name: &str, _key: &VersionKey, _output: &RunOutput) -> CoreResult<()> {
        self.accepted.lock().unwrap().push(file_name.to_string());
        Ok(())
    }
}

fn snapshot(n: usize, deps: &[(usize, usize)]) -> VersionSnapshot {
    let nodes = (0..n).map(|i| GraphNode::artifact(format!("n{i}"), format!("f{i}.py"))).collect();
    let edges = deps.iter()
                    .enumerate()
                    .map(|(k, (a, b))| GraphEdge::new(format!("d{k}"), format!("n{a}"), format!("n{b}"), EdgeKind::DependsOn))
                    .collect();
    NewVersion::new(VersionKey::new("demo", "v1"), "alice", nodes, edges).into_snapshot(chrono::Utc::now())
}

/// DAG aleatorio: sólo aristas de índice menor a mayor, luego los nodos se
/// barajan con una permutación para que el orden del snapshot no coincida.
fn dag() -> impl Strategy<Value = (Vec<String>, Vec<(String, String)>)> {
    (2usize..12).prop_flat_map(|n| {
                    let edges = proptest::collection::vec((0..n, 0..n), 0..(n * 2));
                    (Just(n), edges, Just((0..n).collect::<Vec<_>>()).prop_shuffle())
                })
                .prop_map(|(_n, raw, perm)| {
                    let names: Vec<String> = perm.iter().map(|i| format!("a{i}")).collect();
                    let pairs = raw.into_iter()
                                   .filter(|(a, b)| a < b)
                                   .map(|(a, b)| (format!("a{a}"), format!("a{b}")))
                                   .collect();
                    (names, pairs)
                })
}

proptest! {
    #[test]
    fn every_edge_runs_producer_first((names, pairs) in dag()) {
        let order = execution_order(&names, &pairs).unwrap();
        prop_assert_eq!(order.len(), names.len());
        let pos = |x: &str| order.iter().position(|o| o == x).unwrap();
        for (from, to) in &pairs {
            prop_assert!(pos(from) < pos(to), "{} must run before {}", from, to);
        }
    }
}

#[test]
fn scheduler_feeds_sink_before_dependents_run() {
    let snap = snapshot(3, &[(2, 0), (0, 1)]);
    let exec = Recorder::default();
    let sink = Sink::default();
    let journal = InMemoryExecutionJournal::new();
    let report = Scheduler::new(&exec, &sink, &journal).run(&snap).unwrap();
    assert_eq!(report.order, vec!["f2.py", "f0.py", "f1.py"]);
    assert_eq!(*sink.accepted.lock().unwrap(), report.order);
    assert_eq!(report.outputs["f0.py"].value, "f0.py");
    let events = journal.list(&snap.key).unwrap();
    assert!(matches!(events.last().map(|e| &e.kind), Some(ExecutionEventKind::PassCompleted { executed: 3 })));
}

#[test]
fn cycle_fails_before_anything_runs() {
    let snap = snapshot(3, &[(0, 1), (1, 0)]);
    let exec = Recorder::default();
    let sink = Sink::default();
    let journal = InMemoryExecutionJournal::new();
    let err = Scheduler::new(&exec, &sink, &journal).run(&snap).unwrap_err();
    assert_eq!(err, CoreError::CycleDetected { remaining: vec!["f0.py".into(), "f1.py".into()] });
    assert!(exec.executed.lock().unwrap().is_empty());
    assert!(journal.list(&snap.key).unwrap().is_empty());
}

#[test]
fn failure_aborts_remaining_artifacts() {
    let snap = snapshot(3, &[(0, 1), (1, 2)]);
    let exec = Recorder { fail_on: Some("f1.py".into()), ..Default::default() };
    let sink = Sink::default();
    let journal = InMemoryExecutionJournal::new();
    let err = Scheduler::new(&exec, &sink, &journal).run(&snap).unwrap_err();
    assert!(matches!(err, CoreError::ExecutionError { .. }));
    assert_eq!(*exec.executed.lock().unwrap(), vec!["f0.py".to_string()]);
    let last = journal.list(&snap.key).unwrap().pop().map(|e| e.kind);
    assert_eq!(last, Some(ExecutionEventKind::PassAborted { failed: "f1.py".into(), executed: 1 }));
}

/// Journal que acepta el arranque de la pasada y falla al registrar errores.
struct FailingJournal {
    inner: InMemoryExecutionJournal,
}

impl ExecutionJournal for FailingJournal {
    fn append(&self, key: &VersionKey, kind: ExecutionEventKind) -> CoreResult<ExecutionEvent> {
        match kind {
            ExecutionEventKind::ArtifactFailed { .. } | ExecutionEventKind::PassAborted { .. } => {
                Err(CoreError::Store("journal offline".into()))
            }
            other => self.inner.append(key, other),
        }
    }

    fn list(&self, key: &VersionKey) -> CoreResult<Vec<ExecutionEvent>> {
        self.inner.list(key)
    }
}

#[test]
fn journal_failure_does_not_mask_the_artifact_error() {
    let snap = snapshot(2, &[(0, 1)]);
    let exec = Recorder { fail_on: Some("f0.py".into()), ..Default::default() };
    let sink = Sink::default();
    let journal = FailingJournal { inner: InMemoryExecutionJournal::new() };
    let err = Scheduler::new(&exec, &sink, &journal).run(&snap).unwrap_err();
    assert!(matches!(err, CoreError::ExecutionError { ref artifact, .. } if artifact == "f0.py"));
}
