// Excel row import (xlsx, xls, xlsb, ods)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};

use logicheck_recon::model::{RawRow, RawValue};

/// Row cap per sheet; exports beyond this are truncated with a warning.
const MAX_ROWS: usize = 1_048_576;

/// Read the first worksheet into header-keyed rows.
///
/// The first non-empty row is the header row. Columns with a blank header
/// are ignored and a repeated header keeps its first column. Date cells
/// become spreadsheet serials (1900 system) for the normalizer to convert.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>, String> {
    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "Excel file contains no sheets".to_string())?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let mut lines = range
        .rows()
        .skip_while(|cells| cells.iter().all(|c| matches!(c, Data::Empty)));

    let Some(header_cells) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_cells.iter().map(header_text).collect();

    let mut rows = Vec::new();
    for (idx, cells) in lines.enumerate() {
        if idx >= MAX_ROWS {
            log::warn!(
                "sheet '{}' in {} truncated at {} rows",
                sheet_name,
                path.display(),
                MAX_ROWS
            );
            break;
        }

        let mut row = RawRow::new();
        for (header, cell) in headers.iter().zip(cells.iter()) {
            if header.is_empty() || row.get(header).is_some() {
                continue;
            }
            row.insert(header, cell_value(cell));
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }

    log::debug!(
        "read {} row(s) from '{}' in {}",
        rows.len(),
        sheet_name,
        path.display()
    );
    Ok(rows)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => format_number(*n),
        Data::Int(n) => n.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        _ => String::new(),
    }
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Float(n) => RawValue::Number(*n),
        Data::Int(n) => RawValue::Number(*n as f64),
        Data::Bool(b) => RawValue::Bool(*b),
        // #N/A and friends carry no data
        Data::Error(_) => RawValue::Empty,
        Data::DateTime(dt) => RawValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::Text(s.clone()),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
