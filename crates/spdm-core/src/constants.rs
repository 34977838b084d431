//! Constantes del motor.
//!
//! Nombres estables usados por el formato de intercambio, los backends de
//! almacenamiento y el runner. Cambiarlos rompe la compatibilidad con grafos
//! ya persistidos.

/// Directorio de almacenamiento de artifacts cuando `STORAGE_DIR` no está
/// definido.
pub const DEFAULT_STORAGE_DIR: &str = "/usr/src/storage";

/// Intérprete usado para artifacts de tipo script.
pub const DEFAULT_PYTHON_BIN: &str = "python3";

/// Prefijo de las copias temporales (`temp_<millis>_<rand>_<file>`).
pub const TEMP_PREFIX: &str = "temp_";

/// Formato numérico aplicado a la columna de valores en hojas de cálculo.
pub const SPREADSHEET_NUMBER_FORMAT: &str = "0.000000";

/// Nombre de la función de entrada de los scripts.
pub const SCRIPT_ENTRY_FUNCTION: &str = "main";

/// Comienzo de la guarda que abre la sección de declaración de inputs.
pub const SCRIPT_MAIN_GUARD: &str = "if __name__";

/// Labels de nodos en el formato de intercambio.
pub mod labels {
    pub const PROCESS: &str = "Process";
    pub const VERSION: &str = "Version";
    pub const ARTIFACT: &str = "Artifact";
    pub const SUBGROUP: &str = "Subgroup";
    pub const PARAMETER: &str = "Parameter";

    /// Labels heredados del editor gráfico.
    pub const LEGACY_VERSION: &str = "Label1";
    pub const LEGACY_PARAMETER: &str = "Label2";
    pub const LEGACY_ARTIFACT: &str = "Label3";
    pub const LEGACY_SUBGROUP: &str = "Sublabel";
}

/// Tipos de relación en el formato de intercambio.
pub mod relations {
    pub const CONTAINMENT: &str = "Containment";
    pub const CREATED_BY: &str = "CREATED_BY";
    pub const DEPENDS_ON: &str = "DependsOn";

    pub const LEGACY_CONTAINMENT: &[&str] = &["_", "TYPE1"];
    pub const LEGACY_DEPENDS_ON: &[&str] = &["Type2", "TYPE2"];
}
