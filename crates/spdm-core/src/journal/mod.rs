//! Journal de ejecución append-only por versión.

mod store;
mod types;

pub use store::{ExecutionJournal, InMemoryExecutionJournal};
pub use types::{ExecutionEvent, ExecutionEventKind};
