//! `GraphStore` sobre Postgres.
//!
//! Layout:
//! - `versions`: una fila por snapshot, `UNIQUE (process_name, version_name)`.
//! - `graph_nodes` / `graph_edges`: JSON tipado completo en `data` (sin
//!   `created_at`, que vive en su columna) y `ordinal` para conservar el
//!   orden de declaración.
//! - `artifact_links`: vínculos artifact → proceso/creador.
//!
//! Borrar una versión elimina la fila de `versions`; el resto cae por
//! `ON DELETE CASCADE`.

use chrono::{DateTime, SubsecRound, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use log::debug;
use serde_json::Value;

use spdm_core::model::{ArtifactLink, GraphEdge, GraphNode, NewVersion, ParameterUpdate, ProcessSummary, VersionKey,
                       VersionSnapshot, VersionSummary};
use spdm_core::store::{GraphStore, Page, VersionQuery};
use spdm_core::{CoreError, CoreResult};

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{artifact_links, graph_edges, graph_nodes, processes, versions};

// Límite holgado para no exceder los 65535 parámetros ligados por sentencia.
const INSERT_CHUNK: usize = 1000;

#[derive(Insertable, Debug)]
#[diesel(table_name = processes)]
struct NewProcessRow<'a> {
    name: &'a str,
    created_by: &'a str,
    created_at: DateTime<Utc>,
}

#[derive(Queryable, Debug)]
struct ProcessRow {
    name: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = versions)]
struct NewVersionRow<'a> {
    process_name: &'a str,
    version_name: &'a str,
    created_by: &'a str,
    created_at: DateTime<Utc>,
}

/// Fila de `versions` (orden de columnas del `table!`).
#[derive(Queryable, Debug)]
struct VersionRow {
    id: i64,
    process_name: String,
    version_name: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl VersionRow {
    fn key(&self) -> VersionKey {
        VersionKey::new(self.process_name.clone(), self.version_name.clone())
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = graph_nodes)]
struct NewNodeRow<'a> {
    version_id: i64,
    node_id: &'a str,
    ordinal: i32,
    kind: &'a str,
    data: Value,
    created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = graph_edges)]
struct NewEdgeRow<'a> {
    version_id: i64,
    edge_id: &'a str,
    ordinal: i32,
    kind: &'a str,
    source_id: &'a str,
    target_id: &'a str,
    data: Value,
    created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = artifact_links)]
struct NewLinkRow<'a> {
    version_id: i64,
    node_id: &'a str,
    process_name: &'a str,
    created_by: &'a str,
}

/// Implementación Postgres de `GraphStore`.
pub struct PgGraphStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgGraphStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Ejecuta `f` dentro de una transacción `read_write` con reintentos.
    fn write_tx<T, F>(&self, mut f: F) -> Result<T, PersistenceError>
        where F: FnMut(&mut PgConnection) -> Result<T, PersistenceError>
    {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_write().run(|tx| f(tx))
        })
    }

    /// Lecturas multi-tabla sobre una misma foto de la base.
    fn read_tx<T, F>(&self, mut f: F) -> Result<T, PersistenceError>
        where F: FnMut(&mut PgConnection) -> Result<T, PersistenceError>
    {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_only().repeatable_read().run(|tx| f(tx))
        })
    }
}

// Timestamptz guarda microsegundos; se trunca antes de devolver el snapshot
// para que lo devuelto y lo leído coincidan.
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn encode_node(n: &GraphNode) -> Result<Value, PersistenceError> {
    let mut bare = n.clone();
    bare.created_at = None;
    Ok(serde_json::to_value(&bare)?)
}

fn encode_edge(e: &GraphEdge) -> Result<Value, PersistenceError> {
    let mut bare = e.clone();
    bare.created_at = None;
    Ok(serde_json::to_value(&bare)?)
}

fn find_version(conn: &mut PgConnection, key: &VersionKey) -> Result<Option<VersionRow>, PersistenceError> {
    Ok(versions::table.filter(versions::process_name.eq(&key.process))
                      .filter(versions::version_name.eq(&key.version))
                      .first::<VersionRow>(conn)
                      .optional()?)
}

fn process_row_exists(conn: &mut PgConnection, name: &str) -> Result<bool, PersistenceError> {
    Ok(processes::table.find(name)
                       .select(processes::name)
                       .first::<String>(conn)
                       .optional()?
                       .is_some())
}

fn insert_snapshot(conn: &mut PgConnection, snapshot: &VersionSnapshot) -> Result<i64, PersistenceError> {
    let created_at = snapshot.created_at.unwrap_or_else(now_micros);
    let created_by = snapshot.created_by.as_deref().unwrap_or_default();
    let version_id: i64 = diesel::insert_into(versions::table).values(NewVersionRow { process_name: &snapshot.key.process,
                                                                                      version_name: &snapshot.key.version,
                                                                                      created_by,
                                                                                      created_at })
                                                              .returning(versions::id)
                                                              .get_result(conn)?;

    let mut nodes = Vec::with_capacity(snapshot.nodes.len());
    for (i, n) in snapshot.nodes.iter().enumerate() {
        nodes.push(NewNodeRow { version_id,
                                node_id: &n.id,
                                ordinal: i as i32,
                                kind: n.kind().as_str(),
                                data: encode_node(n)?,
                                created_at: n.created_at.unwrap_or(created_at) });
    }
    for chunk in nodes.chunks(INSERT_CHUNK) {
        diesel::insert_into(graph_nodes::table).values(chunk).execute(conn)?;
    }

    let mut edges = Vec::with_capacity(snapshot.edges.len());
    for (i, e) in snapshot.edges.iter().enumerate() {
        edges.push(NewEdgeRow { version_id,
                                edge_id: &e.id,
                                ordinal: i as i32,
                                kind: e.kind.as_str(),
                                source_id: &e.source,
                                target_id: &e.target,
                                data: encode_edge(e)?,
                                created_at: e.created_at.unwrap_or(created_at) });
    }
    for chunk in edges.chunks(INSERT_CHUNK) {
        diesel::insert_into(graph_edges::table).values(chunk).execute(conn)?;
    }

    let links: Vec<NewLinkRow> = snapshot.links
                                         .iter()
                                         .map(|l| NewLinkRow { version_id,
                                                               node_id: &l.node_id,
                                                               process_name: &l.process,
                                                               created_by: &l.created_by })
                                         .collect();
    for chunk in links.chunks(INSERT_CHUNK) {
        diesel::insert_into(artifact_links::table).values(chunk).execute(conn)?;
    }
    debug!("insert_snapshot {}: id={version_id} nodes={} edges={}", snapshot.key, nodes.len(), edges.len());
    Ok(version_id)
}

fn load_snapshot(conn: &mut PgConnection, row: VersionRow) -> Result<VersionSnapshot, PersistenceError> {
    let node_rows: Vec<(Value, DateTime<Utc>)> =
        graph_nodes::table.filter(graph_nodes::version_id.eq(row.id))
                          .order(graph_nodes::ordinal.asc())
                          .select((graph_nodes::data, graph_nodes::created_at))
                          .load(conn)?;
    let mut nodes = Vec::with_capacity(node_rows.len());
    for (data, ts) in node_rows {
        let mut n: GraphNode = serde_json::from_value(data)?;
        n.created_at = Some(ts);
        nodes.push(n);
    }

    let edge_rows: Vec<(Value, DateTime<Utc>)> =
        graph_edges::table.filter(graph_edges::version_id.eq(row.id))
                          .order(graph_edges::ordinal.asc())
                          .select((graph_edges::data, graph_edges::created_at))
                          .load(conn)?;
    let mut edges = Vec::with_capacity(edge_rows.len());
    for (data, ts) in edge_rows {
        let mut e: GraphEdge = serde_json::from_value(data)?;
        e.created_at = Some(ts);
        edges.push(e);
    }

    let mut links: Vec<ArtifactLink> =
        artifact_links::table.filter(artifact_links::version_id.eq(row.id))
                             .select((artifact_links::node_id, artifact_links::process_name, artifact_links::created_by))
                             .load::<(String, String, String)>(conn)?
                             .into_iter()
                             .map(|(node_id, process, created_by)| ArtifactLink { node_id, process, created_by })
                             .collect();
    // mismo orden que los nodos
    links.sort_by_key(|l| nodes.iter().position(|n| n.id == l.node_id).unwrap_or(usize::MAX));

    Ok(VersionSnapshot { key: row.key(),
                         created_by: Some(row.created_by),
                         created_at: Some(row.created_at),
                         nodes,
                         edges,
                         links })
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn filtered_versions<'a>(process: &'a str, q: &VersionQuery) -> versions::BoxedQuery<'a, Pg> {
    let mut query = versions::table.filter(versions::process_name.eq(process)).into_boxed();
    if let Some(term) = q.search_term() {
        let pattern = format!("%{}%", escape_like(term));
        query = query.filter(versions::version_name.ilike(pattern.clone())
                                                   .or(versions::created_by.ilike(pattern)));
    }
    if let Some(from) = q.from {
        query = query.filter(versions::created_at.ge(from));
    }
    if let Some(to) = q.to {
        query = query.filter(versions::created_at.le(to));
    }
    query
}

fn filtered_processes(q: &VersionQuery) -> processes::BoxedQuery<'static, Pg> {
    let mut query = processes::table.into_boxed();
    if let Some(term) = q.search_term() {
        let pattern = format!("%{}%", escape_like(term));
        query = query.filter(processes::name.ilike(pattern.clone()).or(processes::created_by.ilike(pattern)));
    }
    if let Some(from) = q.from {
        query = query.filter(processes::created_at.ge(from));
    }
    if let Some(to) = q.to {
        query = query.filter(processes::created_at.le(to));
    }
    query
}

impl<P: ConnectionProvider> GraphStore for PgGraphStore<P> {
    fn create_process(&self, name: &str, creator: &str) -> CoreResult<()> {
        debug!("create_process:start name={name}");
        self.write_tx(|tx| {
                diesel::insert_into(processes::table).values(NewProcessRow { name,
                                                                              created_by: creator,
                                                                              created_at: now_micros() })
                                                     .execute(tx)?;
                Ok(())
            })
            .map_err(|e| match e {
                PersistenceError::UniqueViolation(_) => CoreError::Conflict(format!("process {name} already exists")),
                other => other.into(),
            })
    }

    fn process_exists(&self, name: &str) -> CoreResult<bool> {
        Ok(self.read_tx(|tx| process_row_exists(tx, name))?)
    }

    fn create_version(&self, version: NewVersion) -> CoreResult<VersionSnapshot> {
        version.validate()?;
        let snapshot = version.into_snapshot(now_micros());
        let key = snapshot.key.clone();
        debug!("create_version:start {key}");
        self.write_tx(|tx| {
                if !process_row_exists(tx, &key.process)? {
                    return Err(PersistenceError::Missing(format!("process {}", key.process)));
                }
                if find_version(tx, &key)?.is_some() {
                    return Err(PersistenceError::Conflict(format!("version {} of {} already exists",
                                                                  key.version, key.process)));
                }
                insert_snapshot(tx, &snapshot)
            })
            .map_err(|e| match e {
                // carrera entre dos creaciones concurrentes
                PersistenceError::UniqueViolation(_) => {
                    CoreError::Conflict(format!("version {} of {} already exists", key.version, key.process))
                }
                other => other.into(),
            })?;
        debug!("create_version:done {key}");
        Ok(snapshot)
    }

    fn replace_version(&self, version: NewVersion) -> CoreResult<VersionSnapshot> {
        version.validate()?;
        let snapshot = version.into_snapshot(now_micros());
        let key = snapshot.key.clone();
        self.write_tx(|tx| {
                let existing = find_version(tx, &key)?.ok_or_else(|| PersistenceError::Missing(format!("version {key}")))?;
                diesel::delete(versions::table.find(existing.id)).execute(tx)?;
                insert_snapshot(tx, &snapshot)
            })?;
        debug!("replace_version:done {key}");
        Ok(snapshot)
    }

    fn delete_version(&self, key: &VersionKey) -> CoreResult<bool> {
        let removed = self.write_tx(|tx| {
                              let n = diesel::delete(versions::table.filter(versions::process_name.eq(&key.process))
                                                                    .filter(versions::version_name.eq(&key.version)))
                                      .execute(tx)?;
                              Ok(n > 0)
                          })?;
        debug!("delete_version {key}: removed={removed}");
        Ok(removed)
    }

    fn fetch_version(&self, key: &VersionKey) -> CoreResult<VersionSnapshot> {
        Ok(self.read_tx(|tx| match find_version(tx, key)? {
                   Some(row) => load_snapshot(tx, row),
                   None => Ok(VersionSnapshot::empty(key.clone())),
               })?)
    }

    fn fetch_latest_version(&self, process: &str) -> CoreResult<VersionSnapshot> {
        Ok(self.read_tx(|tx| {
                   let latest = versions::table.filter(versions::process_name.eq(process))
                                               .order((versions::created_at.desc(), versions::version_name.desc()))
                                               .first::<VersionRow>(tx)
                                               .optional()?;
                   match latest {
                       Some(row) => load_snapshot(tx, row),
                       None if process_row_exists(tx, process)? => {
                           Err(PersistenceError::Missing(format!("no version for process {process}")))
                       }
                       None => Err(PersistenceError::Missing(format!("process {process}"))),
                   }
               })?)
    }

    fn list_versions(&self, process: &str, query: &VersionQuery) -> CoreResult<Page<VersionSummary>> {
        Ok(self.read_tx(|tx| {
                   let total: i64 = filtered_versions(process, query).count().get_result(tx)?;
                   let rows: Vec<VersionRow> =
                       filtered_versions(process, query).order((versions::created_at.desc(), versions::version_name.desc()))
                                                        .offset(query.offset() as i64)
                                                        .limit(query.limit() as i64)
                                                        .load(tx)?;
                   let items = rows.into_iter()
                                   .map(|r| VersionSummary { key: r.key(),
                                                             created_by: r.created_by,
                                                             created_at: r.created_at })
                                   .collect();
                   Ok(Page { items,
                             total: total as usize,
                             page: query.page.max(1),
                             per_page: query.limit() })
               })?)
    }

    fn list_processes(&self, query: &VersionQuery) -> CoreResult<Page<ProcessSummary>> {
        Ok(self.read_tx(|tx| {
                   let total: i64 = filtered_processes(query).count().get_result(tx)?;
                   let rows: Vec<ProcessRow> = filtered_processes(query).order((processes::created_at.desc(), processes::name.desc()))
                                                                        .offset(query.offset() as i64)
                                                                        .limit(query.limit() as i64)
                                                                        .load(tx)?;
                   let items = rows.into_iter()
                                   .map(|r| ProcessSummary { name: r.name,
                                                             created_by: r.created_by,
                                                             created_at: r.created_at })
                                   .collect();
                   Ok(Page { items,
                             total: total as usize,
                             page: query.page.max(1),
                             per_page: query.limit() })
               })?)
    }

    fn update_parameters(&self, key: &VersionKey, updates: &[ParameterUpdate]) -> CoreResult<()> {
        self.write_tx(|tx| {
                let row = find_version(tx, key)?.ok_or_else(|| PersistenceError::Missing(format!("version {key}")))?;
                for u in updates {
                    let data: Option<Value> = graph_nodes::table.find((row.id, u.node_id.as_str()))
                                                                .select(graph_nodes::data)
                                                                .for_update()
                                                                .first(tx)
                                                                .optional()?;
                    let missing = || PersistenceError::Missing(format!("parameter node {} in {key}", u.node_id));
                    let mut node: GraphNode = serde_json::from_value(data.ok_or_else(missing)?)?;
                    let param = node.as_parameter_mut().ok_or_else(missing)?;
                    param.value = u.value.clone();
                    diesel::update(graph_nodes::table.find((row.id, u.node_id.as_str())))
                        .set(graph_nodes::data.eq(encode_node(&node)?))
                        .execute(tx)?;
                }
                Ok(())
            })?;
        debug!("update_parameters {key}: {} value(s)", updates.len());
        Ok(())
    }
}
