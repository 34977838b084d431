//! Artifact Runner.
//!
//! Rol en el flujo:
//! - Copia el archivo de respaldo a un temporal único en el mismo directorio
//!   (`temp_<millis>_<rand>_<file>`); el original nunca se modifica.
//! - Liga los inputs actuales (vía [`InputResolver`]) en la copia.
//! - Ejecuta la copia y captura su resultado según el tipo de artifact.
//! - El temporal se borra al salir del scope, haya error o no.

pub mod process;
pub mod script;
pub mod spreadsheet;

pub use script::OutputMode;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

use crate::config::RunnerConfig;
use crate::constants::TEMP_PREFIX;
use crate::errors::{CoreError, CoreResult};
use crate::model::{ArtifactNode, ArtifactType, VersionKey};
use crate::resolver::{InputResolver, ResolvedInput};
use crate::store::GraphStore;

/// Resultado capturado de una ejecución.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub mode: OutputMode,
    pub value: String,
}

pub struct ArtifactRunner<S> {
    resolver: InputResolver<S>,
    config: RunnerConfig,
}

impl<S: GraphStore> ArtifactRunner<S> {
    pub fn new(store: S, config: RunnerConfig) -> Self {
        Self { resolver: InputResolver::new(store), config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Ejecuta el artifact `file_name` de la versión `key`.
    ///
    /// `Ok(None)` cuando el artifact no produce un resultado capturable
    /// (hojas de cálculo, scripts sin salida o con stdout vacío).
    pub fn run(&self, file_name: &str, key: &VersionKey) -> CoreResult<Option<RunOutput>> {
        let original = self.config.artifact_path(&key.process, file_name);
        if !original.is_file() {
            return Err(CoreError::not_found(format!("artifact file {}", original.display())));
        }
        let inputs = self.resolver.resolve_inputs(file_name, key)?;
        log::debug!("{key}: running {file_name} with {} input(s)", inputs.len());
        match ArtifactNode::new(file_name).artifact_type() {
            ArtifactType::Script => self.run_script(&original, file_name, &inputs),
            ArtifactType::Spreadsheet => {
                let temp = temp_copy(&original, file_name)?;
                fs::copy(&original, temp.path())?;
                let written = spreadsheet::patch_workbook(temp.path(), &inputs)?;
                log::debug!("{file_name}: {written} spreadsheet cell(s) written");
                // los valores calculados requieren un motor de fórmulas; no hay resultado
                Ok(None)
            }
            ArtifactType::Other(ext) => {
                Err(CoreError::Unsupported(format!("artifact {file_name} has unsupported extension '{ext}'")))
            }
        }
    }

    fn run_script(&self, original: &Path, file_name: &str, inputs: &[ResolvedInput]) -> CoreResult<Option<RunOutput>> {
        let source = fs::read_to_string(original)?;
        let mode = script::detect_output_mode(&source);
        let mut patched = script::patch_inputs(&source, inputs);
        let mut scratch: Option<NamedTempFile> = None;
        match mode {
            Some(OutputMode::Return) => patched = script::print_return_value(&patched),
            Some(OutputMode::Csv) => {
                let dir = parent_dir(original);
                let csv = Builder::new().prefix(TEMP_PREFIX).suffix(".csv").tempfile_in(dir)?;
                let target = csv.path().display().to_string();
                patched = script::redirect_csv(&patched, &target).unwrap_or(patched);
                scratch = Some(csv);
            }
            Some(OutputMode::Print) | None => {}
        }

        let temp = temp_copy(original, file_name)?;
        fs::write(temp.path(), patched)?;
        let stdout = process::run_interpreter(&self.config.python_bin, temp.path(), parent_dir(original), file_name)?;
        drop(temp);

        let Some(mode) = mode else {
            log::debug!("{file_name}: no output statement in main");
            return Ok(None);
        };
        let value = match (&mode, scratch) {
            (OutputMode::Csv, Some(csv)) => {
                let content = fs::read_to_string(csv.path())?;
                script::last_csv_cell(&content).unwrap_or_default()
            }
            _ => stdout.trim().to_string(),
        };
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(RunOutput { mode, value }))
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

/// Temporal vacío `temp_<millis>_<rand>_<file>` junto al original; se borra
/// al soltarse.
fn temp_copy(original: &Path, file_name: &str) -> CoreResult<NamedTempFile> {
    let prefix = format!("{TEMP_PREFIX}{}_", Utc::now().timestamp_millis());
    let suffix = format!("_{file_name}");
    Ok(Builder::new().prefix(&prefix)
                     .suffix(&suffix)
                     .rand_bytes(6)
                     .tempfile_in(parent_dir(original))?)
}
