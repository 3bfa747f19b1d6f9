pub mod commands;
pub mod config;
pub mod error;
pub mod excel;
pub mod models;
pub mod services;
pub mod text;
pub mod types;

pub use commands::{run_batch, run_reconciliation, ProgressSink, ReportSink};
pub use config::Settings;
pub use error::ReconError;
pub use excel::XlsxReportWriter;
pub use types::{LineItemRecord, ProgressEvent, RunSummary};
