//! Receipt block detection: a journal sheet is a run of blocks, each opened by a row whose
//! marker cell holds a receipt number (`000123`, `RTS000456`) and followed by its line items.

use crate::models::{Cell, ColumnMap, ColumnRole, RawSheet, SheetRow};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

static RECEIPT_MARKER: OnceLock<Regex> = OnceLock::new();
static SUPPLIER_NOISE: OnceLock<Regex> = OnceLock::new();

/// Pagination leftovers that repeat inside the item rows.
const ARTIFACT_MARKERS: &[&str] = &["Page", "Delivery Date"];

fn receipt_marker() -> &'static Regex {
    RECEIPT_MARKER.get_or_init(|| Regex::new(r"^(RTS)?000\d+$").expect("receipt marker regex"))
}

fn supplier_noise() -> &'static Regex {
    // parenthesised notes, invoice-type suffixes (专票 special / 普票 general), trailing tax rate
    SUPPLIER_NOISE.get_or_init(|| {
        Regex::new(r"[（(].*[)）]|(?:[（(]|\s+)?(?:专票|普票).*|\d+%$").expect("supplier noise regex")
    })
}

pub fn is_receipt_marker(cell: &Cell) -> bool {
    receipt_marker().is_match(&cell.render())
}

/// Strip invoice annotations from a supplier cell: "供应商(专票) 13%" → "供应商".
pub fn clean_supplier(raw: &str) -> String {
    supplier_noise().replace_all(raw, "").trim().to_string()
}

/// Item row filter: a product cell must be present and not a page header/footer artifact.
pub fn is_item_row(product: &Cell) -> bool {
    if product.is_empty() {
        return false;
    }
    let text = product.render();
    !ARTIFACT_MARKERS.iter().any(|m| text.contains(m))
}

/// One receipt: its header row plus the item rows that survived filtering.
#[derive(Debug, Clone)]
pub struct ReceiptBlock<'a> {
    pub receipt_number: String,
    pub raw_supplier: &'a Cell,
    pub raw_date: &'a Cell,
    /// Sheet rows covered by the block, header included.
    pub span: Range<usize>,
    pub items: Vec<SheetRow<'a>>,
}

impl<'a> ReceiptBlock<'a> {
    /// Body rows before filtering (header excluded).
    pub fn body_len(&self) -> usize {
        self.span.len().saturating_sub(1)
    }
}

/// Single-pass iterator over the receipt blocks of one sheet, in row order.
pub struct ReceiptBlocks<'a> {
    sheet: &'a RawSheet,
    columns: ColumnMap,
    markers: Vec<usize>,
    next: usize,
}

impl<'a> ReceiptBlocks<'a> {
    /// Number of receipt markers found, i.e. how many blocks this iterator yields in total.
    pub fn total(&self) -> usize {
        self.markers.len()
    }
}

impl<'a> Iterator for ReceiptBlocks<'a> {
    type Item = ReceiptBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = *self.markers.get(self.next)?;
        let end = self
            .markers
            .get(self.next + 1)
            .copied()
            .unwrap_or_else(|| self.sheet.row_count());
        self.next += 1;

        let header = self.sheet.row(start);
        let product_col = self.columns.get(ColumnRole::ProductName);
        let items = (start + 1..end)
            .map(|r| self.sheet.row(r))
            .filter(|row| is_item_row(row.get(product_col)))
            .collect();

        Some(ReceiptBlock {
            receipt_number: header.get(self.columns.get(ColumnRole::ReceiptNumber)).render(),
            raw_supplier: header.get(self.columns.get(ColumnRole::Supplier)),
            raw_date: header.get(self.columns.get(ColumnRole::ReceiptDate)),
            span: start..end,
            items,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.markers.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ReceiptBlocks<'_> {}

/// Scan the receipt-number column top to bottom and return the blocks it delimits.
/// A sheet without markers yields nothing.
pub fn receipt_blocks<'a>(sheet: &'a RawSheet, columns: &ColumnMap) -> ReceiptBlocks<'a> {
    let marker_col = columns.get(ColumnRole::ReceiptNumber);
    let markers = (0..sheet.row_count())
        .filter(|&r| is_receipt_marker(sheet.cell(r, marker_col)))
        .collect();
    ReceiptBlocks {
        sheet,
        columns: *columns,
        markers,
        next: 0,
    }
}
