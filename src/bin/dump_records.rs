//! Print the normalized records of receiving journals as JSON lines.

use clap::Parser;
use receipt_recon_lib::commands::{collect_records, Silent};
use receipt_recon_lib::Settings;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Dump parsed line items of receiving journals, one JSON object per line.")]
struct Args {
    /// Receiving journal workbooks.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Settings file (default: ./recon.toml).
    #[arg(long, env = "RECEIPT_RECON_CONFIG")]
    config: Option<PathBuf>,

    /// Only records whose supplier contains this text.
    #[arg(long)]
    supplier: Option<String>,
}

fn run(args: Args) -> Result<(), String> {
    let settings = Settings::load_or_default(args.config.as_deref()).map_err(|e| e.to_string())?;
    let columns = settings.column_map();
    eprintln!("columns: {}", columns.describe());

    let records = collect_records(&args.files, &settings, &columns, &Silent).map_err(|e| e.to_string())?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut written = 0usize;
    for record in &records {
        if let Some(filter) = &args.supplier {
            if !record.supplier_name.contains(filter.as_str()) {
                continue;
            }
        }
        let line = serde_json::to_string(record).map_err(|e| format!("Failed to serialize record: {}", e))?;
        writeln!(out, "{}", line).map_err(|e| e.to_string())?;
        written += 1;
    }
    out.flush().map_err(|e| e.to_string())?;
    eprintln!("{} of {} records", written, records.len());
    Ok(())
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
