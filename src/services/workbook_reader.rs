//! Workbook loading with calamine (0-based row/col).

use crate::error::ReconError;
use crate::models::{excel_serial_to_date, parse_date_text, Cell, RawSheet};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Which worksheets of a workbook to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetSelection {
    First,
    All,
}

fn workbook_error(path: &Path, message: impl ToString) -> ReconError {
    ReconError::Workbook {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Convert one calamine value into a [`Cell`].
pub fn to_cell(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            match excel_serial_to_date(serial) {
                Some(date) => {
                    let seconds = ((serial.fract() * 86_400.0).round() as u32).min(86_399);
                    date.and_hms_opt(seconds / 3600, (seconds % 3600) / 60, seconds % 60)
                        .map(Cell::DateTime)
                        .unwrap_or(Cell::Number(serial))
                }
                None => Cell::Number(serial),
            }
        }
        Data::DateTimeIso(s) => parse_date_text(s)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        // #N/A, #DIV/0! and friends read as missing
        Data::Error(_) => Cell::Empty,
    }
}

/// Cells keep their absolute column index (column A is index 0) even when the used
/// range starts further right. The first `skip_rows` spreadsheet rows are dropped.
fn range_to_sheet(sheet_name: &str, range: &calamine::Range<Data>, skip_rows: usize) -> RawSheet {
    if range.is_empty() {
        return RawSheet::new(sheet_name, Vec::new());
    }
    let Some((end_row, end_col)) = range.end() else {
        return RawSheet::new(sheet_name, Vec::new());
    };
    let mut rows = Vec::new();
    for row in (skip_rows as u32)..=end_row {
        let cells: Vec<Cell> = (0..=end_col)
            .map(|col| range.get_value((row, col)).map(to_cell).unwrap_or_default())
            .collect();
        rows.push(cells);
    }
    // trailing blank rows carry nothing and only inflate row counts
    while rows.last().map(|r: &Vec<Cell>| r.iter().all(Cell::is_empty)).unwrap_or(false) {
        rows.pop();
    }
    RawSheet::new(sheet_name, rows)
}

/// Load the selected worksheets of a workbook, in workbook order.
pub fn read_workbook(path: &Path, selection: SheetSelection, skip_rows: usize) -> Result<Vec<RawSheet>, ReconError> {
    if !path.exists() {
        return Err(workbook_error(path, "File not found."));
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(path, format!("Could not open Excel file: {}", e)))?;
    let names = workbook.sheet_names().to_vec();
    let names: Vec<String> = match selection {
        SheetSelection::First => names.into_iter().take(1).collect(),
        SheetSelection::All => names,
    };
    if names.is_empty() {
        return Err(workbook_error(path, "Workbook has no worksheets"));
    }
    let mut sheets = Vec::with_capacity(names.len());
    for name in &names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| workbook_error(path, format!("Sheet '{}' unreadable: {}", name, e)))?;
        sheets.push(range_to_sheet(name, &range, skip_rows));
    }
    Ok(sheets)
}
