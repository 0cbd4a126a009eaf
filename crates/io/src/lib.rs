// File I/O operations

pub mod csv;
pub mod store;
pub mod workspace;
pub mod xlsx;

use std::path::Path;

use logicheck_recon::model::RawRow;

pub use store::JsonFileStore;
pub use workspace::Workspace;

/// Read a spreadsheet export into raw rows, dispatching on the file extension.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => crate::xlsx::read_rows(path),
        "csv" | "tsv" | "txt" => crate::csv::read_rows(path),
        _ => Err(format!("Unsupported file type: {}", path.display())),
    }
}
