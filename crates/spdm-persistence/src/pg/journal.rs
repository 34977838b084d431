//! `ExecutionJournal` sobre la tabla `execution_log`.
//!
//! `seq` es BIGSERIAL global a la tabla: dentro de una versión es creciente,
//! no necesariamente contiguo ni con base 0.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{debug, warn};
use serde_json::Value;

use spdm_core::model::VersionKey;
use spdm_core::{CoreResult, ExecutionEvent, ExecutionEventKind, ExecutionJournal};

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::execution_log;

#[derive(Insertable, Debug)]
#[diesel(table_name = execution_log)]
struct NewLogRow<'a> {
    process_name: &'a str,
    version_name: &'a str,
    event_type: &'a str,
    payload: &'a Value,
}

#[derive(Queryable, Debug)]
struct LogRow {
    seq: i64,
    process_name: String,
    version_name: String,
    ts: DateTime<Utc>,
    #[allow(dead_code)]
    event_type: String,
    payload: Value,
}

/// Nombre en minúsculas usado por el CHECK de `event_type`.
fn event_type_for(kind: &ExecutionEventKind) -> &'static str {
    match kind {
        ExecutionEventKind::PassStarted { .. } => "passstarted",
        ExecutionEventKind::ArtifactStarted { .. } => "artifactstarted",
        ExecutionEventKind::ArtifactFinished { .. } => "artifactfinished",
        ExecutionEventKind::ArtifactFailed { .. } => "artifactfailed",
        ExecutionEventKind::PassCompleted { .. } => "passcompleted",
        ExecutionEventKind::PassAborted { .. } => "passaborted",
    }
}

fn decode(row: LogRow) -> Option<ExecutionEvent> {
    match serde_json::from_value::<ExecutionEventKind>(row.payload) {
        Ok(kind) => Some(ExecutionEvent { seq: row.seq as u64,
                                          key: VersionKey::new(row.process_name, row.version_name),
                                          kind,
                                          ts: row.ts }),
        Err(e) => {
            warn!("execution_log seq={} has an undecodable payload: {e}", row.seq);
            None
        }
    }
}

pub struct PgExecutionJournal<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgExecutionJournal<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> ExecutionJournal for PgExecutionJournal<P> {
    fn append(&self, key: &VersionKey, kind: ExecutionEventKind) -> CoreResult<ExecutionEvent> {
        let event_type = event_type_for(&kind);
        let payload = serde_json::to_value(&kind).map_err(PersistenceError::from)?;
        let (seq, ts): (i64, DateTime<Utc>) = with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    Ok(diesel::insert_into(execution_log::table).values(NewLogRow { process_name: &key.process,
                                                                                     version_name: &key.version,
                                                                                     event_type,
                                                                                     payload: &payload })
                                                                .returning((execution_log::seq, execution_log::ts))
                                                                .get_result(tx)?)
                })
        })?;
        debug!("append {key}: seq={seq} type={event_type}");
        Ok(ExecutionEvent { seq: seq as u64,
                            key: key.clone(),
                            kind,
                            ts })
    }

    fn list(&self, key: &VersionKey) -> CoreResult<Vec<ExecutionEvent>> {
        let rows: Vec<LogRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            execution_log::table.filter(execution_log::process_name.eq(&key.process))
                                .filter(execution_log::version_name.eq(&key.version))
                                .order(execution_log::seq.asc())
                                .load(&mut conn)
                                .map_err(PersistenceError::from)
        })?;
        Ok(rows.into_iter().filter_map(decode).collect())
    }
}
