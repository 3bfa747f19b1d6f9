use crate::config::Settings;
use crate::error::ReconError;
use crate::models::ColumnMap;
use crate::services::aggregate::{group_by_supplier, SupplierGroup};
use crate::services::receipt_blocks::receipt_blocks;
use crate::services::record_normalizer::normalize_block;
use crate::services::workbook_reader::read_workbook;
use crate::types::{LineItemRecord, ProgressEvent, RunSummary};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Receives progress milestones. Fire-and-forget: a sink must never fail the run.
pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for mpsc::Sender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // receiver gone means nobody is listening any more
        let _ = self.send(event);
    }
}

/// Discards every event.
pub struct Silent;

impl ProgressSink for Silent {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Output side of a run: one statement per supplier plus the merged backup table.
pub trait ReportSink {
    fn write_supplier(&mut self, group: &SupplierGroup) -> Result<PathBuf, ReconError>;
    fn write_backup(&mut self, records: &[LineItemRecord]) -> Result<PathBuf, ReconError>;
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse one journal workbook into records, in sheet and row order.
/// Sheets without receipt markers are skipped with a warning.
pub fn load_file_records(
    path: &Path,
    settings: &Settings,
    columns: &ColumnMap,
    progress: &dyn ProgressSink,
) -> Result<Vec<LineItemRecord>, ReconError> {
    let file = display_name(path);
    tracing::info!(file = %path.display(), "reading workbook");
    progress.emit(ProgressEvent::FileStarted { file: file.clone() });

    let sheets = read_workbook(path, settings.sheet_selection(), settings.skip_rows)?;
    let mut records = Vec::new();
    for sheet in &sheets {
        tracing::info!(file = %file, sheet = %sheet.name, rows = sheet.row_count(), "sheet loaded");
        progress.emit(ProgressEvent::RowsRead {
            file: file.clone(),
            sheet: sheet.name.clone(),
            rows: sheet.row_count(),
        });

        let blocks = receipt_blocks(sheet, columns);
        let total = blocks.total();
        if total == 0 {
            let e = ReconError::NoReceiptMarkersFound {
                file: path.to_path_buf(),
                sheet: sheet.name.clone(),
            };
            tracing::warn!("{}", e);
            progress.emit(ProgressEvent::NoReceipts {
                file: file.clone(),
                sheet: sheet.name.clone(),
            });
            continue;
        }
        tracing::info!(sheet = %sheet.name, receipts = total, "receipt markers found");

        for (i, block) in blocks.enumerate() {
            let items = normalize_block(&block, columns);
            tracing::debug!(
                receipt = %block.receipt_number,
                rows = block.body_len(),
                items = items.len(),
                "receipt processed"
            );
            records.extend(items);
            progress.emit(ProgressEvent::BlockProcessed { index: i + 1, total });
        }
    }

    tracing::info!(file = %file, records = records.len(), "workbook done");
    progress.emit(ProgressEvent::FileFinished {
        file,
        records: records.len(),
    });
    Ok(records)
}

/// Concatenate the records of every input file, in input order.
pub fn collect_records(
    files: &[PathBuf],
    settings: &Settings,
    columns: &ColumnMap,
    progress: &dyn ProgressSink,
) -> Result<Vec<LineItemRecord>, ReconError> {
    let mut records = Vec::new();
    for path in files {
        records.extend(load_file_records(path, settings, columns, progress)?);
    }
    progress.emit(ProgressEvent::FilesMerged { records: records.len() });
    Ok(records)
}

/// Parse all files, write one statement per supplier, then the backup table.
/// The first file or write error aborts the rest of the batch; a failed backup does not.
pub fn run_batch(
    files: &[PathBuf],
    settings: &Settings,
    columns: &ColumnMap,
    reports: &mut dyn ReportSink,
    progress: &dyn ProgressSink,
) -> Result<RunSummary, ReconError> {
    tracing::debug!(columns = %columns.describe(), "column map");
    let records = collect_records(files, settings, columns, progress)?;
    if records.is_empty() {
        return Err(ReconError::EmptyAggregateResult);
    }

    let unassigned = records.iter().filter(|r| !r.has_supplier()).count();
    if unassigned > 0 {
        tracing::warn!(records = unassigned, "records without supplier are left out of the statements");
    }

    let groups = group_by_supplier(&records)?;
    let mut summary = RunSummary {
        files: files.len(),
        records: records.len(),
        suppliers: groups.len(),
        unassigned_records: unassigned,
        ..RunSummary::default()
    };
    for (i, group) in groups.iter().enumerate() {
        let path = reports.write_supplier(group)?;
        tracing::info!(supplier = %group.supplier_name, path = %path.display(), "statement written");
        progress.emit(ProgressEvent::SupplierWritten {
            index: i + 1,
            total: groups.len(),
            supplier: group.supplier_name.clone(),
            path: path.clone(),
        });
        summary.reports.push(path);
    }

    if settings.backup {
        match reports.write_backup(&records) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "backup written");
                progress.emit(ProgressEvent::BackupWritten { path: path.clone() });
                summary.backup = Some(path);
            }
            Err(e) => {
                tracing::warn!("backup failed: {}", e);
                progress.emit(ProgressEvent::BackupFailed { error: e.to_string() });
            }
        }
    }
    Ok(summary)
}

/// Front-end entry point: runs the batch and always ends with a `Finished` event.
pub fn run_reconciliation(
    files: &[PathBuf],
    settings: &Settings,
    columns: &ColumnMap,
    reports: &mut dyn ReportSink,
    progress: &dyn ProgressSink,
) -> Result<RunSummary, String> {
    match run_batch(files, settings, columns, reports, progress) {
        Ok(summary) => {
            tracing::info!("{}", summary);
            progress.emit(ProgressEvent::Finished {
                success: true,
                message: summary.to_string(),
            });
            Ok(summary)
        }
        Err(e) => {
            tracing::error!("reconciliation failed: {}", e);
            let message = e.to_string();
            progress.emit(ProgressEvent::Finished {
                success: false,
                message: message.clone(),
            });
            Err(message)
        }
    }
}

/// Terminal event for a worker thread that panicked instead of returning.
pub fn panic_event(payload: &(dyn Any + Send)) -> ProgressEvent {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    ProgressEvent::Finished {
        success: false,
        message: format!("Worker thread panicked: {}", detail),
    }
}
