//! Graph Snapshot Store.
//!
//! Rol en el flujo:
//! - Persiste un snapshot por `(process, version)`; una versión confirmada es
//!   de sólo lectura salvo el valor de sus nodos parámetro.
//! - Editar una versión = borrar y recrear el subgrafo completo bajo la misma
//!   clave, en una sola unidad atómica.
//! - Toda mutación es todo-o-nada: un grafo parcial nunca queda visible.
//!
//! `InMemoryGraphStore` (este crate) y `PgGraphStore` (`spdm-persistence`)
//! deben comportarse igual para cualquier secuencia de operaciones.

mod memory;

pub use memory::InMemoryGraphStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreResult;
use crate::model::{NewVersion, ParameterUpdate, ProcessSummary, VersionKey, VersionSnapshot, VersionSummary};

/// Filtro y paginado de listados (más recientes primero). Sirve tanto para
/// versiones de un proceso como para procesos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionQuery {
    /// Subcadena buscada en el nombre o en el creador, sin distinguir
    /// mayúsculas.
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Página 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl Default for VersionQuery {
    fn default() -> Self {
        Self { search: None,
               from: None,
               to: None,
               page: 1,
               per_page: 20 }
    }
}

/// Lo que un listado necesita de cada fila para filtrar y ordenar.
pub trait Listed {
    fn name(&self) -> &str;
    fn creator(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Listed for VersionSummary {
    fn name(&self) -> &str {
        &self.key.version
    }
    fn creator(&self) -> &str {
        &self.created_by
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Listed for ProcessSummary {
    fn name(&self) -> &str {
        &self.name
    }
    fn creator(&self) -> &str {
        &self.created_by
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl VersionQuery {
    /// Término de búsqueda recortado; `None` si queda vacío.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn matches<T: Listed>(&self, s: &T) -> bool {
        let text_ok = match self.search_term() {
            Some(term) => {
                let term = term.to_lowercase();
                s.name().to_lowercase().contains(&term) || s.creator().to_lowercase().contains(&term)
            }
            None => true,
        };
        text_ok
        && self.from.map(|f| s.created_at() >= f).unwrap_or(true)
        && self.to.map(|t| s.created_at() <= t).unwrap_or(true)
    }

    /// Offset de la página pedida (páginas < 1 se tratan como la primera).
    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1) * self.per_page.max(1)
    }

    pub fn limit(&self) -> usize {
        self.per_page.max(1)
    }

    /// Ordena (más reciente primero, desempate por nombre), filtra y pagina.
    pub fn paginate<T: Listed>(&self, mut all: Vec<T>) -> Page<T> {
        all.retain(|s| self.matches(s));
        sort_newest_first(&mut all);
        let total = all.len();
        let items = all.into_iter().skip(self.offset()).take(self.limit()).collect();
        Page { items, total, page: self.page.max(1), per_page: self.limit() }
    }
}

/// Orden canónico de listados: `created_at` descendente, luego nombre
/// descendente.
pub fn sort_newest_first<T: Listed>(items: &mut [T]) {
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.name().cmp(a.name())));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Contrato del store de snapshots.
pub trait GraphStore: Send + Sync {
    /// Crea la raíz de un proceso. `Conflict` si el nombre ya existe.
    fn create_process(&self, name: &str, creator: &str) -> CoreResult<()>;

    fn process_exists(&self, name: &str) -> CoreResult<bool>;

    /// Confirma una versión nueva. `Conflict` si `(process, version)` ya
    /// existe; `NotFound` si el proceso no existe.
    fn create_version(&self, version: NewVersion) -> CoreResult<VersionSnapshot>;

    /// Borra y recrea la versión bajo la misma clave en una sola transacción.
    /// `NotFound` si la versión no existe.
    fn replace_version(&self, version: NewVersion) -> CoreResult<VersionSnapshot>;

    /// Devuelve `true` si había algo que borrar.
    fn delete_version(&self, key: &VersionKey) -> CoreResult<bool>;

    /// Snapshot completo; una versión ausente devuelve un grafo vacío.
    fn fetch_version(&self, key: &VersionKey) -> CoreResult<VersionSnapshot>;

    /// Versión más reciente del proceso. `NotFound` si no tiene ninguna.
    fn fetch_latest_version(&self, process: &str) -> CoreResult<VersionSnapshot>;

    fn list_versions(&self, process: &str, query: &VersionQuery) -> CoreResult<Page<VersionSummary>>;

    /// Procesos filtrados por nombre o creador y rango de fechas de creación.
    fn list_processes(&self, query: &VersionQuery) -> CoreResult<Page<ProcessSummary>>;

    /// Única mutación en sitio: valores de nodos parámetro, todo-o-nada.
    fn update_parameters(&self, key: &VersionKey, updates: &[ParameterUpdate]) -> CoreResult<()>;
}

impl<T: GraphStore + ?Sized> GraphStore for std::sync::Arc<T> {
    fn create_process(&self, name: &str, creator: &str) -> CoreResult<()> {
        (**self).create_process(name, creator)
    }
    fn process_exists(&self, name: &str) -> CoreResult<bool> {
        (**self).process_exists(name)
    }
    fn create_version(&self, version: NewVersion) -> CoreResult<VersionSnapshot> {
        (**self).create_version(version)
    }
    fn replace_version(&self, version: NewVersion) -> CoreResult<VersionSnapshot> {
        (**self).replace_version(version)
    }
    fn delete_version(&self, key: &VersionKey) -> CoreResult<bool> {
        (**self).delete_version(key)
    }
    fn fetch_version(&self, key: &VersionKey) -> CoreResult<VersionSnapshot> {
        (**self).fetch_version(key)
    }
    fn fetch_latest_version(&self, process: &str) -> CoreResult<VersionSnapshot> {
        (**self).fetch_latest_version(process)
    }
    fn list_versions(&self, process: &str, query: &VersionQuery) -> CoreResult<Page<VersionSummary>> {
        (**self).list_versions(process, query)
    }
    fn list_processes(&self, query: &VersionQuery) -> CoreResult<Page<ProcessSummary>> {
        (**self).list_processes(query)
    }
    fn update_parameters(&self, key: &VersionKey, updates: &[ParameterUpdate]) -> CoreResult<()> {
        (**self).update_parameters(key, updates)
    }
}
