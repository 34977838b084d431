//! spdm: CLI sobre `VersionService`.
//!
//! Con `DATABASE_URL` definido usa Postgres (pool + migraciones); sin él, o
//! con `--memory`, arma un store en memoria que vive sólo durante el comando.
//! `run` es el atajo para ese caso: crea proceso y versión desde un archivo
//! y ejecuta la pasada completa.
//!
//! La salida es JSON en stdout; los errores salen como
//! `{"error": clase, "message": texto}` en stderr con código de salida por
//! clase.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};

use spdm_core::{classify_error, parse_elements, CoreError, CoreResult, CreateVersionRequest, ErrorClass, ExecuteRequest,
                ExecutionJournal, GraphStore, InMemoryExecutionJournal, InMemoryGraphStore, RunnerConfig, VersionQuery,
                VersionService};
use spdm_persistence::{build_dev_pool_from_env, DbConfig, PgExecutionJournal, PgGraphStore, PoolProvider};

#[derive(Parser)]
#[command(name = "spdm", version = env!("CARGO_PKG_VERSION"), about = "Versioned process graphs with dependency-ordered artifact execution")]
struct Cli {
    /// Artifact storage directory (overrides STORAGE_DIR)
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Use the in-memory store even when DATABASE_URL is set
    #[arg(long, global = true)]
    memory: bool,

    /// Creator recorded on new processes and versions
    #[arg(long, global = true, default_value = "cli")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process roots
    #[command(subcommand)]
    Process(ProcessCmd),
    /// Version snapshots
    #[command(subcommand)]
    Version(VersionCmd),
    /// Execute every artifact of a version in dependency order
    Execute { process: String, version: String },
    /// Execution journal of a version
    Log { process: String, version: String },
    /// Create process + version from a graph file and execute it
    Run {
        graph: PathBuf,
        #[arg(long, default_value = "local")]
        process: String,
    },
}

#[derive(Subcommand)]
enum ProcessCmd {
    Create { name: String },
    /// Processes matching name or creator, newest first
    List {
        #[command(flatten)]
        filter: ListArgs,
    },
}

#[derive(Subcommand)]
enum VersionCmd {
    /// Create a version from a JSON file (request object or bare element list)
    Create {
        process: String,
        file: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Replace the whole graph of an existing version
    Edit {
        process: String,
        file: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    Delete { process: String, version: String },
    Fetch { process: String, version: String },
    Latest { process: String },
    List {
        process: String,
        #[command(flatten)]
        filter: ListArgs,
    },
}

#[derive(Args)]
struct ListArgs {
    /// Substring of the name or the creator
    #[arg(long)]
    search: Option<String>,
    /// RFC 3339, inclusive
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// RFC 3339, inclusive
    #[arg(long)]
    to: Option<DateTime<Utc>>,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long, default_value_t = 20)]
    per_page: usize,
}

impl From<ListArgs> for VersionQuery {
    fn from(a: ListArgs) -> Self {
        VersionQuery { search: a.search,
                       from: a.from,
                       to: a.to,
                       page: a.page,
                       per_page: a.per_page }
    }
}

/// Lee una solicitud de versión. Acepta `{"versionName", "elements"}` o una
/// lista de elementos; `name` pisa el nombre del archivo.
fn read_request(path: &Path, name: Option<String>) -> CoreResult<CreateVersionRequest> {
    let text = fs::read_to_string(path).map_err(|e| CoreError::not_found(format!("{}: {e}", path.display())))?;
    let raw: Value = serde_json::from_str(&text)?;
    let mut req = match raw {
        Value::Array(_) => CreateVersionRequest { version_name: String::new(),
                                                  elements: parse_elements(raw)? },
        other => serde_json::from_value(other)?,
    };
    if let Some(n) = name {
        req.version_name = n;
    }
    Ok(req)
}

fn to_json<T: Serialize>(v: &T) -> CoreResult<Value> {
    serde_json::to_value(v).map_err(|e| CoreError::Store(format!("encode output: {e}")))
}

fn dispatch<S, J>(svc: &VersionService<S, J>, user: &str, command: Command) -> CoreResult<Value>
    where S: GraphStore + Clone,
          J: ExecutionJournal
{
    match command {
        Command::Process(ProcessCmd::Create { name }) => {
            svc.create_process(&name, user)?;
            Ok(json!({ "processName": name.trim(), "createdBy": user }))
        }
        Command::Process(ProcessCmd::List { filter }) => to_json(&svc.list_processes(&VersionQuery::from(filter))?),
        Command::Version(VersionCmd::Create { process, file, name }) => {
            to_json(&svc.create_version(&process, read_request(&file, name)?, user)?)
        }
        Command::Version(VersionCmd::Edit { process, file, name }) => {
            to_json(&svc.edit_version(&process, read_request(&file, name)?, user)?)
        }
        Command::Version(VersionCmd::Delete { process, version }) => {
            Ok(json!({ "deleted": svc.delete_version(&process, &version)? }))
        }
        Command::Version(VersionCmd::Fetch { process, version }) => to_json(&svc.fetch_version(&process, &version)?),
        Command::Version(VersionCmd::Latest { process }) => to_json(&svc.fetch_latest_version(&process)?),
        Command::Version(VersionCmd::List { process, filter }) => {
            to_json(&svc.list_versions(&process, &VersionQuery::from(filter))?)
        }
        Command::Execute { process, version } => {
            to_json(&svc.execute_version(&ExecuteRequest { process_name: process, version_name: version })?)
        }
        Command::Log { process, version } => to_json(&svc.execution_log(&process, &version)?),
        Command::Run { graph, process } => {
            let req = read_request(&graph, None)?;
            let version = req.version_name.trim().to_string();
            if !svc.store().process_exists(process.trim())? {
                svc.create_process(&process, user)?;
            }
            svc.create_version(&process, req, user)?;
            let report = svc.execute_version(&ExecuteRequest { process_name: process.clone(),
                                                               version_name: version.clone() })?;
            let view = svc.fetch_version(&process, &version)?;
            Ok(json!({ "report": to_json(&report)?, "version": to_json(&view)? }))
        }
    }
}

fn exit_code(class: ErrorClass) -> u8 {
    match class {
        ErrorClass::Validation => 2,
        ErrorClass::Conflict => 3,
        ErrorClass::NotFound => 4,
        ErrorClass::Execution => 5,
        ErrorClass::Internal => 1,
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
                             .with_writer(std::io::stderr)
                             .init();

    let cli = Cli::parse();
    let mut config = RunnerConfig::from_env();
    if let Some(dir) = cli.storage_dir {
        config = config.with_storage_root(dir);
    }

    let use_pg = !cli.memory && DbConfig::from_env_opt().is_some();
    let outcome = if use_pg {
        match build_dev_pool_from_env() {
            Ok(pool) => {
                let store = Arc::new(PgGraphStore::new(PoolProvider { pool: pool.clone() }));
                let journal = PgExecutionJournal::new(PoolProvider { pool });
                dispatch(&VersionService::new(store, journal, config), &cli.user, cli.command)
            }
            Err(e) => Err(CoreError::from(e)),
        }
    } else {
        log::info!("using in-memory store (state is discarded on exit)");
        let svc = VersionService::new(Arc::new(InMemoryGraphStore::new()), InMemoryExecutionJournal::new(), config);
        dispatch(&svc, &cli.user, cli.command)
    };

    match outcome {
        Ok(v) => {
            println!("{}", serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.payload());
            ExitCode::from(exit_code(classify_error(&e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_flags_become_a_query() {
        let cli = Cli::try_parse_from(["spdm", "version", "list", "demo", "--search", "v1", "--page", "2",
                                       "--from", "2024-01-01T00:00:00Z"]).unwrap();
        let Command::Version(VersionCmd::List { process, filter }) = cli.command else { panic!("wrong command") };
        let q = VersionQuery::from(filter);
        assert_eq!(process, "demo");
        assert_eq!(q.search.as_deref(), Some("v1"));
        assert_eq!(q.page, 2);
        assert_eq!(q.per_page, 20);
        assert!(q.from.is_some() && q.to.is_none());
    }

    #[test]
    fn process_list_pages_newest_first() {
        let cli = Cli::try_parse_from(["spdm", "process", "list", "--search", "MIX", "--per-page", "1"]).unwrap();
        let Command::Process(ProcessCmd::List { filter }) = cli.command else { panic!("wrong command") };
        assert_eq!(filter.per_page, 1);

        let svc = VersionService::new(Arc::new(InMemoryGraphStore::new()),
                                      InMemoryExecutionJournal::new(),
                                      RunnerConfig::default());
        svc.create_process("mixing", "alice").unwrap();
        svc.create_process("drying", "bob").unwrap();
        let out = dispatch(&svc, "alice", Command::Process(ProcessCmd::List { filter })).unwrap();
        assert_eq!(out["total"], 1);
        assert_eq!(out["items"][0]["name"], "mixing");
        assert_eq!(out["items"][0]["created_by"], "alice");
    }

    #[test]
    fn request_file_accepts_bare_element_list() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"[{{"group": "nodes", "data": {{"id": "n1", "label": "Artifact", "properties": {{"fileName": "a.py"}}}}}}]"#).unwrap();
        let req = read_request(f.path(), Some("v1".into())).unwrap();
        assert_eq!(req.version_name, "v1");
        assert_eq!(req.elements.len(), 1);
    }

    #[test]
    fn run_executes_a_graph_without_artifacts_in_memory() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"versionName": "v1", "elements": []}}"#).unwrap();
        let svc = VersionService::new(Arc::new(InMemoryGraphStore::new()),
                                      InMemoryExecutionJournal::new(),
                                      RunnerConfig::default());
        let out = dispatch(&svc, "alice", Command::Run { graph: f.path().to_path_buf(), process: "local".into() }).unwrap();
        assert_eq!(out["report"]["order"], json!([]));
        assert_eq!(out["version"]["versionName"], "v1");
        let log = dispatch(&svc, "alice", Command::Log { process: "local".into(), version: "v1".into() }).unwrap();
        assert_eq!(log.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn error_classes_have_distinct_exit_codes() {
        assert_eq!(exit_code(classify_error(&CoreError::Conflict("x".into()))), 3);
        assert_eq!(exit_code(classify_error(&CoreError::NotFound("x".into()))), 4);
    }
}
