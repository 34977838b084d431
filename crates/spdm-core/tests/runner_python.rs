//! Ejecución real de scripts; se omite si `python3` no está en el PATH.

use serde_json::json;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use spdm_core::model::{EdgeKind, GraphEdge, GraphNode, NewVersion, ParameterNode, VersionKey};
use spdm_core::store::{GraphStore, InMemoryGraphStore};
use spdm_core::{ArtifactRunner, CoreError, OutputMode, RunnerConfig};

fn python_available() -> bool {
    Command::new("python3").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
}

macro_rules! require_python {
    () => {
        if !python_available() {
            eprintln!("python3 not found, skipping");
            return;
        }
    };
}

fn setup(dir: &Path, file: &str, source: &str, x: serde_json::Value) -> (ArtifactRunner<Arc<InMemoryGraphStore>>, VersionKey) {
    fs::write(dir.join(file), source).unwrap();
    let store = Arc::new(InMemoryGraphStore::new());
    store.create_process("demo", "alice").unwrap();
    let key = VersionKey::new("demo", "v1");
    store.create_version(NewVersion::new(key.clone(),
                                         "alice",
                                         vec![GraphNode::artifact("art", file), GraphNode::parameter("px", ParameterNode::input("x", x))],
                                         vec![GraphEdge::new("e", "px", "art", EdgeKind::Containment)]))
         .unwrap();
    let config = RunnerConfig::default().with_storage_root(dir);
    (ArtifactRunner::new(store, config), key)
}

const RETURN_SCRIPT: &str = "def main():\n    return x * 2\n\nif __name__ == \"__main__\":\n    x = 1\n    main()\n";

#[test]
fn return_mode_prints_bound_result() {
    require_python!();
    let dir = tempfile::tempdir().unwrap();
    let (runner, key) = setup(dir.path(), "calc.py", RETURN_SCRIPT, json!(21));
    let out = runner.run("calc.py", &key).unwrap().unwrap();
    assert_eq!(out.mode, OutputMode::Return);
    assert_eq!(out.value, "42");
    // original intacto y sin temporales
    assert_eq!(fs::read_to_string(dir.path().join("calc.py")).unwrap(), RETURN_SCRIPT);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn print_mode_captures_stdout() {
    require_python!();
    let dir = tempfile::tempdir().unwrap();
    let src = "def main():\n    print(f\"hello {x}\")\n\nif __name__ == \"__main__\":\n    x = 'a'\n    main()\n";
    let (runner, key) = setup(dir.path(), "p.py", src, json!("world"));
    let out = runner.run("p.py", &key).unwrap().unwrap();
    assert_eq!((out.mode, out.value.as_str()), (OutputMode::Print, "hello world"));
}

#[test]
fn csv_mode_reads_last_cell() {
    require_python!();
    let dir = tempfile::tempdir().unwrap();
    let src = "import csv\n\nclass Frame:\n    def to_csv(self, path, index=False):\n        with open(path, 'w', newline='') as f:\n            w = csv.writer(f)\n            w.writerow(['k', 'v'])\n            w.writerow(['a', x + 1])\n\ndef main():\n    Frame().to_csv('result.csv', index=False)\n\nif __name__ == \"__main__\":\n    x = 0\n    main()\n";
    let (runner, key) = setup(dir.path(), "c.py", src, json!(4));
    let out = runner.run("c.py", &key).unwrap().unwrap();
    assert_eq!((out.mode, out.value.as_str()), (OutputMode::Csv, "5"));
    assert!(!dir.path().join("result.csv").exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn stderr_is_an_execution_error_and_temp_is_removed() {
    require_python!();
    let dir = tempfile::tempdir().unwrap();
    let src = "def main():\n    return 1 / x\n\nif __name__ == \"__main__\":\n    x = 1\n    main()\n";
    let (runner, key) = setup(dir.path(), "z.py", src, json!(0));
    let err = runner.run("z.py", &key).unwrap_err();
    match err {
        CoreError::ExecutionError { artifact, message } => {
            assert_eq!(artifact, "z.py");
            assert!(message.contains("ZeroDivisionError"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(fs::read_to_string(dir.path().join("z.py")).unwrap(), src);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn missing_file_and_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, key) = setup(dir.path(), "run.sh", "echo hi\n", json!(1));
    assert!(matches!(runner.run("run.sh", &key), Err(CoreError::Unsupported(_))));
    fs::remove_file(dir.path().join("run.sh")).unwrap();
    assert!(matches!(runner.run("run.sh", &key), Err(CoreError::NotFound(_))));
}
