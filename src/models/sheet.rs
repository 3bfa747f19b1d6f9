use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use std::str::FromStr;

/// One weakly-typed spreadsheet value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

static EMPTY: Cell = Cell::Empty;

/// Date text layouts seen in receiving journals, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Largest serial Excel accepts (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Missing cell or empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for pattern matching and display. Whole numbers print without ".0".
    pub fn render(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Cell::DateTime(dt) => {
                if dt.num_seconds_from_midnight() == 0 {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }

    /// Rendered text, or `None` for an empty cell.
    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.render())
        }
    }

    /// Exact decimal value of a numeric cell, or of numeric text ("1,234.50").
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            // shortest round-trip repr of the f64, so 0.1 stays 0.1
            Cell::Number(n) if n.is_finite() => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&format!("{:e}", n)))
                .ok(),
            Cell::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',' && *c != ' ').collect();
                if cleaned.is_empty() {
                    return None;
                }
                Decimal::from_str(&cleaned).ok()
            }
            _ => None,
        }
    }

    /// Calendar date from a date cell, an Excel serial number or date text.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::DateTime(dt) => Some(dt.date()),
            Cell::Number(n) => excel_serial_to_date(*n),
            Cell::Text(s) => parse_date_text(s),
            _ => None,
        }
    }
}

/// Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    // Excel counts from 1899-12-30 because of its 1900 leap-year bug
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Parse date text in one of the known layouts.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(t, fmt).ok().map(|dt| dt.date()))
        .or_else(|| DATE_FORMATS.iter().find_map(|fmt| NaiveDate::parse_from_str(t, fmt).ok()))
}

/// Positional table of cells for one worksheet, banner rows already skipped.
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column); out-of-range positions read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn row(&self, row: usize) -> SheetRow<'_> {
        SheetRow {
            index: row,
            cells: self.rows.get(row).map(Vec::as_slice).unwrap_or(&[]),
        }
    }
}

/// Borrowed view of one row, addressed by resolved column index.
#[derive(Debug, Clone, Copy)]
pub struct SheetRow<'a> {
    pub index: usize,
    cells: &'a [Cell],
}

impl<'a> SheetRow<'a> {
    pub fn get(&self, col: usize) -> &'a Cell {
        self.cells.get(col).unwrap_or(&EMPTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_whole_numbers_without_fraction() {
        assert_eq!(Cell::Number(123.0).render(), "123");
        assert_eq!(Cell::Number(3.5).render(), "3.5");
        assert_eq!(Cell::text("000123").render(), "000123");
        assert_eq!(Cell::Empty.render(), "");
    }

    #[test]
    fn decimals_do_not_pick_up_binary_noise() {
        assert_eq!(Cell::Number(0.1).as_decimal(), Some(Decimal::new(1, 1)));
        assert_eq!(Cell::Number(-50.0).as_decimal(), Some(Decimal::new(-50, 0)));
        assert_eq!(Cell::text("1,234.50").as_decimal(), Some(Decimal::new(123450, 2)));
        assert_eq!(Cell::text("n/a").as_decimal(), None);
        assert_eq!(Cell::Empty.as_decimal(), None);
        assert_eq!(Cell::Number(f64::NAN).as_decimal(), None);
    }

    #[test]
    fn parses_dates_from_every_cell_kind() {
        let feb15 = NaiveDate::from_ymd_opt(2024, 2, 15);
        assert_eq!(Cell::text("2024-02-15").as_date(), feb15);
        assert_eq!(Cell::text("2024/02/15").as_date(), feb15);
        assert_eq!(Cell::text("2024-02-15 08:30:00").as_date(), feb15);
        assert_eq!(Cell::text("2024年02月15日").as_date(), feb15);
        assert_eq!(Cell::Number(45337.0).as_date(), feb15);
        let dt = feb15.and_then(|d| d.and_hms_opt(10, 0, 0));
        assert_eq!(dt.map(Cell::DateTime).and_then(|c| c.as_date()), feb15);
    }

    #[test]
    fn unparseable_dates_are_none() {
        assert_eq!(Cell::text("next Tuesday").as_date(), None);
        assert_eq!(Cell::Empty.as_date(), None);
        assert_eq!(Cell::Number(-4.0).as_date(), None);
        assert_eq!(Cell::Bool(true).as_date(), None);
    }

    #[test]
    fn out_of_range_cells_read_as_empty() {
        let sheet = RawSheet::new("s", vec![vec![Cell::text("a")]]);
        assert_eq!(sheet.cell(0, 0), &Cell::text("a"));
        assert!(sheet.cell(0, 5).is_empty());
        assert!(sheet.cell(9, 0).is_empty());
        assert!(sheet.row(9).get(3).is_empty());
    }
}
