//! Parcheo textual de scripts Python.
//!
//! No se hace un parseo completo: se localiza el cuerpo de `def main(` y la
//! sección posterior a la guarda `if __name__`, y se reescriben líneas.

use serde_json::Value;

use crate::constants::{SCRIPT_ENTRY_FUNCTION, SCRIPT_MAIN_GUARD};
use crate::resolver::ResolvedInput;

/// Cómo entrega su resultado el script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Print,
    Return,
    Csv,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Print => "print",
            OutputMode::Return => "return",
            OutputMode::Csv => "csv",
        }
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Rango `[start, end)` de las líneas del cuerpo de `main`, sin la línea `def`.
pub fn entry_body_range(lines: &[&str]) -> Option<(usize, usize)> {
    let header = format!("def {SCRIPT_ENTRY_FUNCTION}(");
    let def_idx = lines.iter().position(|l| l.trim_start().starts_with(&header))?;
    let def_indent = indent_of(lines[def_idx]);
    let end = lines.iter()
                   .enumerate()
                   .skip(def_idx + 1)
                   .find(|(_, l)| !l.trim().is_empty() && indent_of(l) <= def_indent)
                   .map(|(i, _)| i)
                   .unwrap_or(lines.len());
    Some((def_idx + 1, end))
}

/// Modo de salida según la primera coincidencia recorriendo `main` de abajo
/// hacia arriba: `print`, luego `return`, luego `to_csv`.
pub fn detect_output_mode(source: &str) -> Option<OutputMode> {
    let lines: Vec<&str> = source.lines().collect();
    let (start, end) = entry_body_range(&lines)?;
    lines[start..end].iter().rev().find_map(|l| {
                                      let t = l.trim();
                                      if t.starts_with("print") {
                                          Some(OutputMode::Print)
                                      } else if t.starts_with("return") {
                                          Some(OutputMode::Return)
                                      } else if t.contains("to_csv") {
                                          Some(OutputMode::Csv)
                                      } else {
                                          None
                                      }
                                  })
}

/// Literal Python para un valor JSON.
pub fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".into(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            let t = s.trim();
            if !t.is_empty() && t.parse::<f64>().map(|f| f.is_finite()).unwrap_or(false) {
                t.to_string()
            } else {
                python_string(s)
            }
        }
        Value::Array(items) => format!("[{}]", items.iter().map(python_literal).collect::<Vec<_>>().join(", ")),
        Value::Object(map) => {
            let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", python_string(k), python_literal(v))).collect();
            format!("{{{}}}", pairs.join(", "))
        }
    }
}

fn python_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `true` si la línea asigna a `name` (`name = ...`, `name: int = ...`).
fn assigns(line: &str, name: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix(name) else { return false };
    let rest = rest.trim_start();
    (rest.starts_with('=') && !rest.starts_with("==")) || rest.starts_with(':')
}

/// Reescribe las asignaciones de inputs posteriores a la guarda `if __name__`
/// como `<indent><name> = <literal>`. Sin guarda, el script queda igual.
pub fn patch_inputs(source: &str, inputs: &[ResolvedInput]) -> String {
    let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
    let Some(guard) = lines.iter().position(|l| l.trim_start().starts_with(SCRIPT_MAIN_GUARD)) else {
        return source.to_string();
    };
    for line in lines.iter_mut().skip(guard + 1) {
        if let Some(input) = inputs.iter().find(|i| assigns(line, &i.name)) {
            let indent = &line[..indent_of(line)];
            *line = format!("{indent}{} = {}", input.name, python_literal(&input.value));
        }
    }
    rejoin(source, lines)
}

/// Cambia la invocación `main()` por `print(main())`.
pub fn print_return_value(source: &str) -> String {
    let call = format!("{SCRIPT_ENTRY_FUNCTION}()");
    let lines: Vec<String> = source.lines()
                                   .map(|l| {
                                       if l.trim() == call {
                                           l.replacen(&call, &format!("print({call})"), 1)
                                       } else {
                                           l.to_string()
                                       }
                                   })
                                   .collect();
    rejoin(source, lines)
}

/// Redirige el destino de la última llamada `to_csv(` dentro de `main` al
/// archivo `target`. Devuelve `None` si no hay tal llamada.
pub fn redirect_csv(source: &str, target: &str) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let (start, end) = entry_body_range(&lines)?;
    let idx = (start..end).rev().find(|&i| lines[i].contains("to_csv("))?;
    let line = lines[idx];
    let open = line.rfind("to_csv(")? + "to_csv(".len();
    let arg_end = first_argument_end(&line[open..]) + open;
    let arg = line[open..arg_end].trim();
    let replacement = if arg.is_empty() || arg.contains('=') {
        // sin argumento posicional: se inserta uno
        let sep = if arg.is_empty() { "" } else { ", " };
        format!("{}{sep}", python_string(target))
    } else {
        python_string(target)
    };
    let patched_line = if arg.contains('=') {
        format!("{}{}{}", &line[..open], replacement, &line[open..])
    } else {
        format!("{}{}{}", &line[..open], replacement, &line[arg_end..])
    };
    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    out[idx] = patched_line;
    Some(rejoin(source, out))
}

/// Posición del fin del primer argumento (`,` o `)` de nivel 0).
fn first_argument_end(s: &str) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth > 0 => depth -= 1,
            ',' | ')' if depth == 0 => return i,
            _ => {}
        }
    }
    s.len()
}

/// Último campo de la última fila no vacía de un CSV. Una fila mal formada
/// corta la lectura.
pub fn last_csv_cell(content: &str) -> Option<String> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false)
                                              .flexible(true)
                                              .from_reader(content.as_bytes());
    let last = reader.records()
                     .map_while(Result::ok)
                     .filter(|r| r.iter().any(|f| !f.trim().is_empty()))
                     .last()?;
    last.iter().last().map(|f| f.trim().to_string())
}

fn rejoin(original: &str, lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    if original.ends_with('\n') {
        out.push('\n');
    }
    out
}
