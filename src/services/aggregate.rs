//! Cross-file aggregation: supplier statements and per-product summaries.

use crate::error::ReconError;
use crate::types::LineItemRecord;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Calendar month a supplier statement covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingPeriod {
    /// First and last day of the month containing `date`.
    pub fn containing(date: NaiveDate) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
        let (next_year, next_month) = if date.month() == 12 {
            (date.year() + 1, 1)
        } else {
            (date.year(), date.month() + 1)
        };
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
        Some(Self { start, end })
    }

    /// `YYYYMM`, used for output folders and file names.
    pub fn label(&self) -> String {
        self.start.format("%Y%m").to_string()
    }
}

/// Synthetic total row of a supplier statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SupplierTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub gross_amount: Decimal,
}

/// One product line of the product summary sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAggregate {
    pub product_name: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    /// Mean of the non-missing unit prices.
    pub unit_price: Option<Decimal>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub tax_rate: Option<Decimal>,
    pub gross_amount: Decimal,
}

/// Synthetic total row of the product summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProductTotals {
    pub quantity: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub gross_amount: Decimal,
}

/// Everything a supplier statement needs.
#[derive(Debug, Clone, Serialize)]
pub struct SupplierGroup {
    pub supplier_name: String,
    /// Sorted by (receipt_date, receipt_number); undated receipts first.
    pub records: Vec<LineItemRecord>,
    /// Month of the first *dated* record; `None` when no record has a date (written to `undated`).
    pub period: Option<ReportingPeriod>,
    pub totals: SupplierTotals,
    /// Sorted by summed quantity, largest first.
    pub products: Vec<ProductAggregate>,
    pub product_totals: ProductTotals,
}

/// Checked sum; missing values count as zero, `None` on overflow.
fn sum<'a>(values: impl Iterator<Item = &'a Option<Decimal>>) -> Option<Decimal> {
    values.flatten().try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
}

/// Sum the three money columns; missing values count as zero. `None` when a sum overflows.
pub fn supplier_totals(records: &[LineItemRecord]) -> Option<SupplierTotals> {
    Some(SupplierTotals {
        subtotal: sum(records.iter().map(|r| &r.subtotal))?,
        tax_amount: sum(records.iter().map(|r| &r.tax_amount))?,
        gross_amount: sum(records.iter().map(|r| &r.gross_amount))?,
    })
}

/// Stable sort by date then receipt number. `None` dates sort first.
pub fn sort_records(records: &mut [LineItemRecord]) {
    records.sort_by(|a, b| {
        a.receipt_date
            .cmp(&b.receipt_date)
            .then_with(|| a.receipt_number.cmp(&b.receipt_number))
    });
}

/// Period of the first dated record in sorted order.
pub fn reporting_period(sorted: &[LineItemRecord]) -> Option<ReportingPeriod> {
    sorted
        .iter()
        .find_map(|r| r.receipt_date)
        .and_then(ReportingPeriod::containing)
}

fn product_aggregate(name: &str, rows: &[&LineItemRecord]) -> Option<ProductAggregate> {
    let prices: Vec<Option<Decimal>> = rows.iter().filter(|r| r.unit_price.is_some()).map(|r| r.unit_price).collect();
    let unit_price = if prices.is_empty() {
        None
    } else {
        sum(prices.iter())?.checked_div(Decimal::from(prices.len()))
    };
    Some(ProductAggregate {
        product_name: name.to_string(),
        quantity: sum(rows.iter().map(|r| &r.quantity))?,
        unit: rows.iter().find_map(|r| r.unit.clone()),
        unit_price,
        subtotal: sum(rows.iter().map(|r| &r.subtotal))?,
        tax_amount: sum(rows.iter().map(|r| &r.tax_amount))?,
        tax_rate: rows.iter().find_map(|r| r.tax_rate),
        gross_amount: sum(rows.iter().map(|r| &r.gross_amount))?,
    })
}

/// Per-product rollup of one supplier's records. `None` when a sum overflows.
pub fn product_aggregates(records: &[LineItemRecord]) -> Option<(Vec<ProductAggregate>, ProductTotals)> {
    let mut by_product: BTreeMap<&str, Vec<&LineItemRecord>> = BTreeMap::new();
    for record in records {
        by_product.entry(record.product_name.as_str()).or_default().push(record);
    }

    let mut products = by_product
        .iter()
        .map(|(name, rows)| product_aggregate(name, rows))
        .collect::<Option<Vec<_>>>()?;
    // stable: equal quantities keep product-name order
    products.sort_by(|a, b| b.quantity.cmp(&a.quantity));

    let totals = products.iter().try_fold(ProductTotals::default(), |acc, p| {
        Some(ProductTotals {
            quantity: acc.quantity.checked_add(p.quantity)?,
            subtotal: acc.subtotal.checked_add(p.subtotal)?,
            tax_amount: acc.tax_amount.checked_add(p.tax_amount)?,
            gross_amount: acc.gross_amount.checked_add(p.gross_amount)?,
        })
    })?;
    Some((products, totals))
}

/// Build one sorted, summarized group per supplier. Records whose supplier is blank belong
/// to no group. Groups come back in supplier-name order.
pub fn group_by_supplier(records: &[LineItemRecord]) -> Result<Vec<SupplierGroup>, ReconError> {
    let mut by_supplier: BTreeMap<&str, Vec<LineItemRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.has_supplier()) {
        by_supplier
            .entry(record.supplier_name.as_str())
            .or_default()
            .push(record.clone());
    }

    by_supplier
        .into_iter()
        .map(|(name, mut rows)| {
            let overflow = || ReconError::AmountOverflow {
                supplier: name.to_string(),
            };
            sort_records(&mut rows);
            let (products, product_totals) = product_aggregates(&rows).ok_or_else(overflow)?;
            Ok(SupplierGroup {
                supplier_name: name.to_string(),
                period: reporting_period(&rows),
                totals: supplier_totals(&rows).ok_or_else(overflow)?,
                records: rows,
                products,
                product_totals,
            })
        })
        .collect()
}
