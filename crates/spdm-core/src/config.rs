//! Configuración del runner desde variables de entorno.
//! `STORAGE_DIR`, `PYTHON_BIN` y `STORAGE_PER_PROCESS` (opcional `.env`).

use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

use crate::constants::{DEFAULT_PYTHON_BIN, DEFAULT_STORAGE_DIR};

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Raíz donde viven los archivos de respaldo de los artifacts.
    pub storage_root: PathBuf,
    /// Intérprete para artifacts `.py`.
    pub python_bin: String,
    /// `storage_root/<process>/<file>` en lugar del directorio plano.
    pub per_process_storage: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { storage_root: PathBuf::from(DEFAULT_STORAGE_DIR),
               python_bin: DEFAULT_PYTHON_BIN.to_string(),
               per_process_storage: false }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        init_dotenv();
        let storage_root = env::var("STORAGE_DIR").ok()
                                                  .filter(|v| !v.trim().is_empty())
                                                  .map(PathBuf::from)
                                                  .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
        let python_bin = env::var("PYTHON_BIN").ok()
                                               .filter(|v| !v.trim().is_empty())
                                               .unwrap_or_else(|| DEFAULT_PYTHON_BIN.to_string());
        let per_process_storage = env::var("STORAGE_PER_PROCESS").ok().map(|v| parse_flag(&v)).unwrap_or(false);
        Self { storage_root, python_bin, per_process_storage }
    }

    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    /// Ruta del archivo de respaldo de `file_name` para `process`.
    pub fn artifact_path(&self, process: &str, file_name: &str) -> PathBuf {
        if self.per_process_storage {
            self.storage_root.join(process).join(file_name)
        } else {
            self.storage_root.join(file_name)
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_layout_follows_flag() {
        let flat = RunnerConfig::default().with_storage_root("/data");
        assert_eq!(flat.artifact_path("demo", "a.py"), PathBuf::from("/data/a.py"));
        let nested = RunnerConfig { per_process_storage: true, ..flat };
        assert_eq!(nested.artifact_path("demo", "a.py"), PathBuf::from("/data/demo/a.py"));
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" 1 "));
        assert!(!parse_flag("no"));
    }
}
