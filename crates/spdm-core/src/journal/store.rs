use chrono::Utc;
use dashmap::DashMap;

use super::{ExecutionEvent, ExecutionEventKind};
use crate::errors::CoreResult;
use crate::model::VersionKey;

/// Almacenamiento de eventos de ejecución append-only.
pub trait ExecutionJournal: Send + Sync {
    /// Agrega un evento y devuelve el evento completo (con seq y ts).
    fn append(&self, key: &VersionKey, kind: ExecutionEventKind) -> CoreResult<ExecutionEvent>;
    /// Eventos de una versión en orden ascendente de `seq`.
    fn list(&self, key: &VersionKey) -> CoreResult<Vec<ExecutionEvent>>;
}

impl<T: ExecutionJournal + ?Sized> ExecutionJournal for std::sync::Arc<T> {
    fn append(&self, key: &VersionKey, kind: ExecutionEventKind) -> CoreResult<ExecutionEvent> {
        (**self).append(key, kind)
    }
    fn list(&self, key: &VersionKey) -> CoreResult<Vec<ExecutionEvent>> {
        (**self).list(key)
    }
}

#[derive(Default)]
pub struct InMemoryExecutionJournal {
    inner: DashMap<VersionKey, Vec<ExecutionEvent>>,
}

impl InMemoryExecutionJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionJournal for InMemoryExecutionJournal {
    fn append(&self, key: &VersionKey, kind: ExecutionEventKind) -> CoreResult<ExecutionEvent> {
        let mut events = self.inner.entry(key.clone()).or_default();
        let ev = ExecutionEvent { seq: events.len() as u64,
                                  key: key.clone(),
                                  kind,
                                  ts: Utc::now() };
        events.push(ev.clone());
        Ok(ev)
    }

    fn list(&self, key: &VersionKey) -> CoreResult<Vec<ExecutionEvent>> {
        Ok(self.inner.get(key).map(|v| v.value().clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_contiguous_per_version() {
        let j = InMemoryExecutionJournal::new();
        let v1 = VersionKey::new("demo", "v1");
        let v2 = VersionKey::new("demo", "v2");
        j.append(&v1, ExecutionEventKind::PassStarted { order: vec![] }).unwrap();
        j.append(&v2, ExecutionEventKind::PassStarted { order: vec![] }).unwrap();
        let last = j.append(&v1, ExecutionEventKind::PassCompleted { executed: 0 }).unwrap();
        assert_eq!(last.seq, 1);
        let seqs: Vec<u64> = j.list(&v1).unwrap().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert!(j.list(&VersionKey::new("demo", "v9")).unwrap().is_empty());
    }
}
