//! Hojas de cálculo: se parchea una copia temporal y no hay resultado.

use serde_json::json;
use std::fs;
use std::sync::Arc;

use spdm_core::model::{EdgeKind, GraphEdge, GraphNode, NewVersion, ParameterNode, VersionKey};
use spdm_core::store::{GraphStore, InMemoryGraphStore};
use spdm_core::{ArtifactRunner, RunnerConfig};

#[test]
fn workbook_run_leaves_original_untouched_and_no_temp_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");
    let mut book = umya_spreadsheet::new_file();
    {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut((1, 1)).set_value("x");
        sheet.get_cell_mut((2, 1)).set_value("0");
    }
    umya_spreadsheet::writer::xlsx::write(&book, &path).unwrap();
    let before = fs::read(&path).unwrap();

    let store = Arc::new(InMemoryGraphStore::new());
    store.create_process("demo", "alice").unwrap();
    let key = VersionKey::new("demo", "v1");
    store.create_version(NewVersion::new(key.clone(),
                                         "alice",
                                         vec![GraphNode::artifact("wb", "book.xlsx"),
                                              GraphNode::parameter("px", ParameterNode::input("x", json!(5)))],
                                         vec![GraphEdge::new("e", "px", "wb", EdgeKind::Containment)]))
         .unwrap();
    let runner = ArtifactRunner::new(store, RunnerConfig::default().with_storage_root(dir.path()));

    assert_eq!(runner.run("book.xlsx", &key).unwrap(), None);
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
