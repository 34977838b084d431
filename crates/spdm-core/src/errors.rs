//! Errores del core.
//!
//! Taxonomía visible para el usuario: `Conflict`, `NotFound`,
//! `ExecutionError` y `ValidationError`. El resto de variantes (`Io`,
//! `Store`, `Unsupported`, `CycleDetected`) se clasifican mediante
//! [`classify_error`] para construir el payload estructurado que ve el
//! cliente.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreError {
    /// A process or version with that name already exists.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Referenced artifact file, version, process or node is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// The artifact subprocess wrote to stderr, exited with failure or could
    /// not be launched.
    #[error("execution of {artifact} failed: {message}")]
    ExecutionError { artifact: String, message: String },
    /// Malformed request payload or graph element.
    #[error("validation failed: {0}")]
    ValidationError(String),
    /// The `DependsOn` relation of the version contains a cycle.
    #[error("dependency cycle detected between: {}", remaining.join(", "))]
    CycleDetected { remaining: Vec<String> },
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("io: {0}")]
    Io(String),
    /// Backend failure reported by a `GraphStore`/`ExecutionJournal`.
    #[error("store: {0}")]
    Store(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::ValidationError(what.into())
    }

    /// Payload estructurado `{ "error": <clase>, "message": <texto> }`.
    ///
    /// Los errores inesperados se registran y se exponen como `internal`
    /// sin filtrar el detalle al cliente.
    pub fn payload(&self) -> Value {
        let class = classify_error(self);
        let message = match class {
            ErrorClass::Internal => {
                log::error!("unexpected error surfaced to caller: {self}");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };
        json!({ "error": class.as_str(), "message": message })
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::ValidationError(format!("json: {e}"))
    }
}

/// Clasificación gruesa usada para mapear errores a respuestas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Conflict,
    NotFound,
    Execution,
    Validation,
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Conflict => "conflict",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Execution => "execution",
            ErrorClass::Validation => "validation",
            ErrorClass::Internal => "internal",
        }
    }
}

pub fn classify_error(err: &CoreError) -> ErrorClass {
    match err {
        CoreError::Conflict(_) => ErrorClass::Conflict,
        CoreError::NotFound(_) => ErrorClass::NotFound,
        CoreError::ExecutionError { .. } => ErrorClass::Execution,
        CoreError::ValidationError(_) | CoreError::CycleDetected { .. } | CoreError::Unsupported(_) => {
            ErrorClass::Validation
        }
        CoreError::Io(_) | CoreError::Store(_) => ErrorClass::Internal,
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_hides_internal_details() {
        let p = CoreError::Store("connection refused on 10.0.0.3".into()).payload();
        assert_eq!(p["error"], "internal");
        assert_eq!(p["message"], "internal error");
    }

    #[test]
    fn payload_keeps_user_visible_message() {
        let p = CoreError::Conflict("version v1 of demo".into()).payload();
        assert_eq!(p["error"], "conflict");
        assert_eq!(p["message"], "conflict: version v1 of demo");
    }

    #[test]
    fn cycle_is_reported_as_validation() {
        let e = CoreError::CycleDetected { remaining: vec!["a.py".into(), "b.py".into()] };
        assert_eq!(classify_error(&e), ErrorClass::Validation);
        assert_eq!(e.to_string(), "dependency cycle detected between: a.py, b.py");
    }
}
