use std::path::Path;

use serde_json::Value;
use umya_spreadsheet::{reader, writer};

use crate::constants::SPREADSHEET_NUMBER_FORMAT;
use crate::errors::{CoreError, CoreResult};
use crate::resolver::ResolvedInput;

const NAME_COLUMN: u32 = 1;
const VALUE_COLUMN: u32 = 2;

/// Escribe los inputs en la columna 2 de cada fila cuyo valor en la columna
/// 1 coincide con el nombre, en todas las hojas. Devuelve cuántas celdas se
/// escribieron.
pub fn patch_workbook(path: &Path, inputs: &[ResolvedInput]) -> CoreResult<usize> {
    let file = path.display().to_string();
    let mut book = reader::xlsx::read(path).map_err(|e| CoreError::ExecutionError { artifact: file.clone(),
                                                                                     message: format!("cannot open workbook: {e}") })?;
    let mut written = 0;
    for sheet in book.get_sheet_collection_mut().iter_mut() {
        let highest = sheet.get_highest_row();
        for row in 1..=highest {
            let label = sheet.get_value((NAME_COLUMN, row));
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            if let Some(input) = inputs.iter().find(|i| i.name == label) {
                let cell = sheet.get_cell_mut((VALUE_COLUMN, row));
                match numeric(&input.value) {
                    Some(n) => {
                        cell.set_value_number(n);
                    }
                    None => {
                        cell.set_value(text(&input.value));
                    }
                }
                sheet.get_style_mut((VALUE_COLUMN, row))
                     .get_number_format_mut()
                     .set_format_code(SPREADSHEET_NUMBER_FORMAT);
                written += 1;
            }
        }
    }
    writer::xlsx::write(&book, path).map_err(|e| CoreError::ExecutionError { artifact: file,
                                                                             message: format!("cannot save workbook: {e}") })?;
    Ok(written)
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
