use std::path::Path;
use std::process::{Command, Stdio};

use crate::errors::{CoreError, CoreResult};

/// Ejecuta `interpreter script` con `cwd` como directorio de trabajo y
/// devuelve el stdout capturado.
///
/// Cualquier salida por stderr, un código de salida distinto de cero o un
/// fallo al lanzar el proceso es un `ExecutionError`. No hay timeout.
pub fn run_interpreter(interpreter: &str, script: &Path, cwd: &Path, artifact: &str) -> CoreResult<String> {
    log::debug!("running {interpreter} {} in {}", script.display(), cwd.display());
    let output = Command::new(interpreter).arg(script)
                                          .current_dir(cwd)
                                          .stdin(Stdio::null())
                                          .stdout(Stdio::piped())
                                          .stderr(Stdio::piped())
                                          .output()
                                          .map_err(|e| CoreError::ExecutionError { artifact: artifact.to_string(),
                                                                                   message: format!("cannot launch {interpreter}: {e}") })?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return Err(CoreError::ExecutionError { artifact: artifact.to_string(),
                                               message: stderr.trim_end().to_string() });
    }
    if !output.status.success() {
        let code = output.status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".into());
        return Err(CoreError::ExecutionError { artifact: artifact.to_string(),
                                               message: format!("exited with status {code}") });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
