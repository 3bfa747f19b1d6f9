use chrono::Local;
use clap::Parser;
use receipt_recon_lib::commands::panic_event;
use receipt_recon_lib::{run_reconciliation, Settings, XlsxReportWriter};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{mpsc, Mutex};
use std::thread;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(version, about = "Split receiving journals into per-supplier reconciliation statements.")]
struct Args {
    /// Receiving journal workbooks (.xlsx, .xls).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Settings file (default: ./recon.toml).
    #[arg(long, env = "RECEIPT_RECON_CONFIG")]
    config: Option<PathBuf>,

    /// Write statements here instead of the configured output folder.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip the merged backup workbook.
    #[arg(long)]
    no_backup: bool,

    /// Open the output folder when done.
    #[arg(long)]
    open: bool,
}

/// Plain-text log file per run plus warnings on stderr.
fn init_logging(log_dir: &Path) -> Result<PathBuf, String> {
    fs::create_dir_all(log_dir).map_err(|e| format!("Failed to create log folder: {}", e))?;
    let path = log_dir.join(format!("process_{}.log", Local::now().format("%Y%m%d_%H%M%S")));
    let file = File::create(&path).map_err(|e| format!("Failed to create log file: {}", e))?;

    let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(file_filter),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::WARN),
        )
        .init();
    Ok(path)
}

fn run(args: Args) -> Result<ExitCode, String> {
    let mut settings = Settings::load_or_default(args.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }
    if args.no_backup {
        settings.backup = false;
    }

    let log_path = init_logging(&settings.log_dir)?;
    tracing::info!(log = %log_path.display(), files = args.files.len(), "run started");

    let columns = settings.column_map();
    let mut reports = XlsxReportWriter {
        output_dir: settings.output_dir.clone(),
        backup_dir: settings.backup_dir.clone(),
        company_name: settings.company_name.clone(),
    };
    let (tx, rx) = mpsc::channel();
    let files = args.files;
    let worker_settings = settings.clone();
    let worker = thread::spawn(move || run_reconciliation(&files, &worker_settings, &columns, &mut reports, &tx));

    for event in rx {
        println!("{}", event);
    }
    let outcome = match worker.join() {
        Ok(outcome) => outcome,
        Err(payload) => {
            let event = panic_event(payload.as_ref());
            tracing::error!("{}", event);
            println!("{}", event);
            return Ok(ExitCode::FAILURE);
        }
    };
    if outcome.is_err() {
        // already reported through the Finished event and the log
        return Ok(ExitCode::FAILURE);
    }

    if args.open {
        if let Err(e) = opener::open(&settings.output_dir) {
            tracing::warn!("Could not open {}: {}", settings.output_dir.display(), e);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    // .env may point RECEIPT_RECON_CONFIG somewhere else
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
