//! CLI entry point for the graduate employment dashboard.
//!
//! Provides subcommands for running the ETL pipeline over the raw survey
//! export, serving the dashboard, and inspecting a CSV after cleaning.

use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use insertion_dashboard::pipeline;
use insertion_dashboard::reference::ReferenceTables;
use insertion_dashboard::server::{self, AppState};
use insertion_dashboard::table::Column;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "insertion_dashboard")]
#[command(about = "ETL and dashboard for graduate employment outcomes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the raw survey CSV and write the processed snapshot
    Run {
        /// Semicolon-delimited survey export
        #[arg(short, long, default_value = "data/raw/fr-esr-insertion_professionnelle-master.csv")]
        input: PathBuf,

        /// Directory receiving clean.parquet and the aggregate JSON files
        #[arg(short, long, default_value = "data/processed")]
        out_dir: PathBuf,

        /// Optional JSON file overriding the academy reference tables
        #[arg(long)]
        reference: Option<PathBuf>,
    },
    /// Serve the dashboard over HTTP
    Serve {
        /// Directory holding the processed snapshot
        #[arg(short, long, default_value = "data/processed")]
        data_dir: PathBuf,

        /// Directory served under /static
        #[arg(short, long, default_value = "static")]
        static_dir: PathBuf,

        /// Bind address (defaults to $HOST or 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (defaults to $PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Optional JSON file overriding the academy reference tables
        #[arg(long)]
        reference: Option<PathBuf>,
    },
    /// Clean a survey CSV and log a summary of the result
    Inspect {
        #[arg(value_name = "CSV")]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/insertion_dashboard.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("insertion_dashboard.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            out_dir,
            reference,
        } => {
            let refs = ReferenceTables::load_or_builtin(reference.as_deref())?;
            let input_path = input.clone();
            let report =
                tokio::task::spawn_blocking(move || pipeline::run(&input, &out_dir, &refs))
                    .await
                    .context("pipeline task panicked")??;
            for w in &report.warnings {
                warn!(warning = %w, "Sanity check");
            }
            info!(input = %input_path.display(), rows = report.rows, "ETL OK");
        }
        Commands::Serve {
            data_dir,
            static_dir,
            host,
            port,
            reference,
        } => {
            let refs = ReferenceTables::load_or_builtin(reference.as_deref())?;
            let addr = bind_address(host, port)?;
            info!(data_dir = %data_dir.display(), static_dir = %static_dir.display(), "Starting server");
            server::serve(addr, AppState::new(data_dir, static_dir, refs)).await?;
        }
        Commands::Inspect { input } => {
            let table = pipeline::clean(&input)?;
            info!(rows = table.len(), "Cleaned table");
            for (name, column) in table.columns() {
                let (kind, nulls) = match column {
                    Column::Number(v) => ("number", v.iter().filter(|x| x.is_none()).count()),
                    Column::Text(v) => ("text", v.iter().filter(|x| x.is_none()).count()),
                };
                info!(column = name, kind, nulls, "Column");
            }
        }
    }

    Ok(())
}

/// Resolves the bind address from flags, then `HOST`/`PORT`, then defaults.
fn bind_address(host: Option<String>, port: Option<u16>) -> Result<SocketAddr> {
    let host = host
        .or_else(|| std::env::var("HOST").ok())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = match port {
        Some(p) => p,
        None => std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000),
    };
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))
}
