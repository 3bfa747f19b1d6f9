mod column_map;
mod sheet;

pub use column_map::{col_index_to_letter, col_letter_to_index, resolve_column, ColumnId, ColumnMap, ColumnRole};
pub use sheet::{excel_serial_to_date, parse_date_text, Cell, RawSheet, SheetRow};
