use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One normalized line of a receiving journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub receipt_number: String,
    pub receipt_date: Option<NaiveDate>,
    pub product_name: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub unit_price: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    /// tax_amount / subtotal; `None` when subtotal is missing or zero.
    pub tax_rate: Option<Decimal>,
    pub gross_amount: Option<Decimal>,
    pub department: Option<String>,
    /// CJK-only supplier key; empty when the receipt had no usable supplier.
    pub supplier_name: String,
}

impl LineItemRecord {
    pub fn has_supplier(&self) -> bool {
        !self.supplier_name.trim().is_empty()
    }
}

/// Processing milestones sent to the front end, in processing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    FileStarted { file: String },
    RowsRead { file: String, sheet: String, rows: usize },
    NoReceipts { file: String, sheet: String },
    BlockProcessed { index: usize, total: usize },
    FileFinished { file: String, records: usize },
    FilesMerged { records: usize },
    SupplierWritten { index: usize, total: usize, supplier: String, path: PathBuf },
    BackupWritten { path: PathBuf },
    BackupFailed { error: String },
    Finished { success: bool, message: String },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::FileStarted { file } => write!(f, "Reading file: {}", file),
            ProgressEvent::RowsRead { file, sheet, rows } => {
                write!(f, "Read {} rows from {} [{}]", rows, file, sheet)
            }
            ProgressEvent::NoReceipts { file, sheet } => {
                write!(f, "No receipts found in {} [{}], skipped", file, sheet)
            }
            ProgressEvent::BlockProcessed { index, total } => write!(f, "Receipts: {}/{}", index, total),
            ProgressEvent::FileFinished { file, records } => {
                write!(f, "Finished {}: {} records", file, records)
            }
            ProgressEvent::FilesMerged { records } => write!(f, "All files processed: {} records", records),
            ProgressEvent::SupplierWritten { index, total, supplier, path } => write!(
                f,
                "Supplier statement ({}/{}) {}: {}",
                index,
                total,
                supplier,
                path.display()
            ),
            ProgressEvent::BackupWritten { path } => write!(f, "Backup written: {}", path.display()),
            ProgressEvent::BackupFailed { error } => write!(f, "Backup failed: {}", error),
            ProgressEvent::Finished { success, message } => {
                if *success {
                    write!(f, "Done. {}", message)
                } else {
                    write!(f, "Failed. {}", message)
                }
            }
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files: usize,
    pub records: usize,
    pub suppliers: usize,
    /// Records left out of every supplier statement because their supplier was blank.
    pub unassigned_records: usize,
    pub reports: Vec<PathBuf>,
    pub backup: Option<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} supplier statements from {} records in {} files",
            self.suppliers, self.records, self.files
        )?;
        if self.unassigned_records > 0 {
            write!(f, " ({} records without supplier not reported)", self.unassigned_records)?;
        }
        Ok(())
    }
}
