use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Invalid column identifier '{identifier}' for {role}")]
    InvalidColumnIdentifier { role: String, identifier: String },

    #[error("Could not parse date '{0}'")]
    DateParseFailure(String),

    #[error("No receipt markers found in sheet '{sheet}' of {}", file.display())]
    NoReceiptMarkersFound { file: PathBuf, sheet: String },

    #[error("No records found in any input file; nothing to report")]
    EmptyAggregateResult,

    #[error("Amount total out of range for supplier '{supplier}'")]
    AmountOverflow { supplier: String },

    #[error("Could not open workbook {}: {message}", path.display())]
    Workbook { path: PathBuf, message: String },

    #[error("Could not write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
