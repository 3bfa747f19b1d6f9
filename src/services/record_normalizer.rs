use crate::error::ReconError;
use crate::models::{Cell, ColumnMap, ColumnRole, SheetRow};
use crate::services::receipt_blocks::{clean_supplier, ReceiptBlock};
use crate::text::{extract_cjk, split_mixed_script};
use crate::types::LineItemRecord;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// tax / subtotal, or `None` when either side is missing or the subtotal is zero.
pub fn tax_rate(tax_amount: Option<Decimal>, subtotal: Option<Decimal>) -> Option<Decimal> {
    let subtotal = subtotal.filter(|s| !s.is_zero())?;
    tax_amount?.checked_div(subtotal)
}

/// Supplier grouping key from the raw header cell: annotations stripped, CJK runs only.
pub fn supplier_key(raw: &Cell) -> String {
    match raw.as_text() {
        Some(text) => extract_cjk(&clean_supplier(&text)),
        None => String::new(),
    }
}

/// Receipt date from the header cell. A non-empty cell that does not parse is reported
/// as [`ReconError::DateParseFailure`] so the caller can log it and carry on with `None`.
pub fn receipt_date(raw: &Cell) -> Result<Option<NaiveDate>, ReconError> {
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.as_date() {
        Some(date) => Ok(Some(date)),
        None => Err(ReconError::DateParseFailure(raw.render())),
    }
}

fn mixed_text(cell: &Cell) -> Option<String> {
    cell.as_text().map(|t| split_mixed_script(&t))
}

/// Build the record for one item row. Header-derived fields are passed in already
/// normalized. Returns `None` when the product cell is empty.
pub fn normalize_row(
    row: &SheetRow<'_>,
    columns: &ColumnMap,
    receipt_number: &str,
    receipt_date: Option<NaiveDate>,
    supplier_name: &str,
) -> Option<LineItemRecord> {
    let product_name = mixed_text(row.get(columns.get(ColumnRole::ProductName)))?;
    let amount = |role: ColumnRole| row.get(columns.get(role)).as_decimal();
    let subtotal = amount(ColumnRole::Subtotal);
    let tax_amount = amount(ColumnRole::TaxAmount);
    Some(LineItemRecord {
        receipt_number: receipt_number.to_string(),
        receipt_date,
        product_name,
        quantity: amount(ColumnRole::Quantity),
        unit: row.get(columns.get(ColumnRole::Unit)).as_text(),
        unit_price: amount(ColumnRole::UnitPrice),
        subtotal,
        tax_amount,
        tax_rate: tax_rate(tax_amount, subtotal),
        gross_amount: amount(ColumnRole::GrossAmount),
        department: mixed_text(row.get(columns.get(ColumnRole::Department))),
        supplier_name: supplier_name.to_string(),
    })
}

/// Normalize every item row of a block.
pub fn normalize_block(block: &ReceiptBlock<'_>, columns: &ColumnMap) -> Vec<LineItemRecord> {
    let date = receipt_date(block.raw_date).unwrap_or_else(|e| {
        tracing::info!(receipt = %block.receipt_number, "{}; receipt kept without date", e);
        None
    });
    let supplier = supplier_key(block.raw_supplier);
    if supplier.is_empty() {
        tracing::debug!(receipt = %block.receipt_number, "receipt has no supplier");
    }
    block
        .items
        .iter()
        .filter_map(|row| normalize_row(row, columns, &block.receipt_number, date, &supplier))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawSheet;
    use crate::services::receipt_blocks::receipt_blocks;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    /// Compact layout: A=marker/product, B=supplier, C=date, D=qty, E=unit, F=price,
    /// G=subtotal, H=tax, I=gross, J=department.
    fn compact_columns() -> ColumnMap {
        ColumnMap::default()
            .with(ColumnRole::Supplier, 1)
            .with(ColumnRole::ReceiptDate, 2)
            .with(ColumnRole::Quantity, 3)
            .with(ColumnRole::Unit, 4)
            .with(ColumnRole::UnitPrice, 5)
            .with(ColumnRole::Subtotal, 6)
            .with(ColumnRole::TaxAmount, 7)
            .with(ColumnRole::GrossAmount, 8)
            .with(ColumnRole::Department, 9)
    }

    fn item(name: &str, qty: f64, price: f64, subtotal: Cell, tax: Cell, gross: f64) -> Vec<Cell> {
        vec![
            Cell::text(name),
            Cell::Empty,
            Cell::Empty,
            Cell::Number(qty),
            Cell::text("KG"),
            Cell::Number(price),
            subtotal,
            tax,
            Cell::Number(gross),
            Cell::text("Kitchen 厨房"),
        ]
    }

    #[test]
    fn tax_rate_is_guarded() {
        assert_eq!(tax_rate(Some(dec("13")), Some(dec("100"))), Some(dec("0.13")));
        assert_eq!(tax_rate(Some(dec("5")), Some(Decimal::ZERO)), None);
        assert_eq!(tax_rate(Some(Decimal::ZERO), Some(Decimal::ZERO)), None);
        assert_eq!(tax_rate(Some(dec("-3")), Some(Decimal::ZERO)), None);
        assert_eq!(tax_rate(Some(dec("-3")), None), None);
        assert_eq!(tax_rate(None, Some(dec("100"))), None);
        assert_eq!(tax_rate(Some(dec("-13")), Some(dec("-100"))), Some(dec("0.13")));
    }

    #[test]
    fn supplier_key_cleans_then_extracts() {
        assert_eq!(supplier_key(&Cell::text("供应商(专票) ABC")), "供应商");
        assert_eq!(supplier_key(&Cell::text("Fresh 鲜果贸易 Co 普票")), "鲜果贸易");
        assert_eq!(supplier_key(&Cell::text("ACME Ltd")), "ACME Ltd");
        assert_eq!(supplier_key(&Cell::text("(专票)")), "");
        assert_eq!(supplier_key(&Cell::Empty), "");
    }

    #[test]
    fn unparseable_date_is_reported_not_fatal() {
        assert_eq!(receipt_date(&Cell::Empty).unwrap(), None);
        assert!(matches!(receipt_date(&Cell::text("soon")), Err(ReconError::DateParseFailure(_))));
        assert_eq!(
            receipt_date(&Cell::text("2024-03-01")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn block_rows_become_records() {
        let rows = vec![
            vec![Cell::text("000100"), Cell::text("上海鲜果(专票)"), Cell::text("2024-02-15")],
            item("Apple 苹果", 10.0, 5.5, Cell::Number(55.0), Cell::Number(4.95), 59.95),
            item("Page 2", 0.0, 0.0, Cell::Empty, Cell::Empty, 0.0),
            item("Pear", 2.0, 3.0, Cell::Number(0.0), Cell::Number(0.0), 0.0),
            item("Plum", 1.0, 1.0, Cell::Empty, Cell::Number(1.0), 1.0),
        ];
        let sheet = RawSheet::new("s", rows);
        let columns = compact_columns();
        let block = receipt_blocks(&sheet, &columns).next().unwrap();
        let records = normalize_block(&block, &columns);
        assert_eq!(records.len(), 3);

        let apple = &records[0];
        assert_eq!(apple.receipt_number, "000100");
        assert_eq!(apple.receipt_date, NaiveDate::from_ymd_opt(2024, 2, 15));
        assert_eq!(apple.supplier_name, "上海鲜果");
        assert_eq!(apple.product_name, "Apple\n苹果");
        assert_eq!(apple.quantity, Some(dec("10")));
        assert_eq!(apple.unit.as_deref(), Some("KG"));
        assert_eq!(apple.unit_price, Some(dec("5.5")));
        assert_eq!(apple.tax_rate, Some(dec("0.09")));
        assert_eq!(apple.gross_amount, Some(dec("59.95")));
        assert_eq!(apple.department.as_deref(), Some("Kitchen\n厨房"));

        assert_eq!(records[1].product_name, "Pear");
        assert_eq!(records[1].tax_rate, None);
        assert_eq!(records[2].subtotal, None);
        assert_eq!(records[2].tax_rate, None);
    }

    #[test]
    fn missing_amounts_stay_missing() {
        let rows = vec![vec![Cell::text("0001")], vec![Cell::text("Salt 盐")]];
        let sheet = RawSheet::new("s", rows);
        let columns = compact_columns();
        let block = receipt_blocks(&sheet, &columns).next().unwrap();
        let records = normalize_block(&block, &columns);
        assert_eq!(records.len(), 1);
        let salt = &records[0];
        assert_eq!(salt.quantity, None);
        assert_eq!(salt.subtotal, None);
        assert_eq!(salt.gross_amount, None);
        assert_eq!(salt.unit, None);
        assert_eq!(salt.department, None);
        assert_eq!(salt.receipt_date, None);
        assert_eq!(salt.supplier_name, "");
    }
}
