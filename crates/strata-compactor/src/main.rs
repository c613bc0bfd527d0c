//! # strata-compactor
//!
//! Consolidates captured row changes for one time-series table into per-day
//! Parquet snapshot files.
//!
//! ## Usage
//!
//! ```bash
//! # Apply a captured batch from a file
//! strata-compactor apply --data-dir /srv/data --input changes.txt
//!
//! # Or stream it in
//! mysqlbinlog -v mysql-bin.000123 | strata-compactor apply --data-dir /srv/data
//!
//! # See what a batch would do without writing
//! strata-compactor apply --data-dir /srv/data --input changes.txt --dry-run
//!
//! # Check the invariants of the persisted day files
//! strata-compactor verify --data-dir /srv/data
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{error, info, warn};

use strata_compactor::decoder::EventDecoder;
use strata_compactor::driver::{self, RunOptions, RunReport};
use strata_compactor::verify;
use strata_core::{ChangeEvent, LocalStore, SnapshotStore};

/// Consolidates captured change events into per-day Parquet snapshots.
#[derive(Debug, Parser)]
#[command(name = "strata-compactor")]
#[command(about = "Merges net row changes into per-day Parquet snapshots")]
#[command(version)]
struct Args {
    /// Directory holding the per-day snapshot files.
    #[arg(long, env = "STRATA_DATA_DIR", global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply one batch of captured events to the day snapshots.
    Apply {
        /// Event text file to read; reads stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Qualified `schema.table` name the capture was taken from.
        #[arg(
            long,
            env = "STRATA_TABLE",
            default_value = "enexory.api_data_timeseries"
        )]
        table: String,

        /// Maximum day merges in flight at once.
        #[arg(long, env = "STRATA_PARALLELISM", default_value = "4")]
        parallelism: usize,

        /// Consolidate and report without touching storage.
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Check the storage invariants of every day snapshot on disk.
    Verify,
}

/// JSON shape of the run summary printed by `apply --json`.
#[derive(Debug, Serialize)]
struct JsonSummary<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    /// Statements the decoder dropped plus events validation discarded.
    malformed: usize,
    elapsed_ms: u128,
    succeeded: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Apply {
            input,
            table,
            parallelism,
            dry_run,
            json,
        } => {
            apply(
                args.data_dir,
                input,
                &table,
                RunOptions {
                    parallelism,
                    dry_run,
                },
                json,
            )
            .await
        }
        Commands::Verify => run_verify(args.data_dir).await,
    }
}

async fn apply(
    data_dir: PathBuf,
    input: Option<PathBuf>,
    table: &str,
    options: RunOptions,
    json: bool,
) -> Result<()> {
    let (schema, table_name) = table
        .split_once('.')
        .ok_or_else(|| anyhow!("table must be a qualified `schema.table` name, got '{table}'"))?;

    let store = LocalStore::open(&data_dir)
        .await
        .context("opening data directory")?;
    let store: Arc<dyn SnapshotStore> = Arc::new(store);

    let reader: Box<dyn AsyncRead + Unpin> = match &input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening event input '{}'", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    let mut decoder = EventDecoder::new(schema, table_name);
    let mut events: Vec<ChangeEvent> = Vec::new();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("reading event stream")?
    {
        if let Some(event) = decoder.feed_line(&line) {
            events.push(event);
        }
    }
    if let Some(event) = decoder.finish() {
        events.push(event);
    }
    if decoder.discarded() > 0 {
        warn!(
            statements = decoder.discarded(),
            "dropped statements with unparseable fields"
        );
    }

    let report = driver::run_batch(store, events, &options).await;
    let malformed = decoder.discarded() + report.events_discarded;
    info!(
        events = report.events_seen,
        malformed,
        days = report.days.len(),
        elapsed = ?report.elapsed,
        "batch complete"
    );

    if json {
        let summary = JsonSummary {
            report: &report,
            malformed,
            elapsed_ms: report.elapsed.as_millis(),
            succeeded: report.succeeded(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if !report.succeeded() {
        bail!("one or more day merges failed; see the per-day report above");
    }
    Ok(())
}

async fn run_verify(data_dir: PathBuf) -> Result<()> {
    let store = LocalStore::open(&data_dir)
        .await
        .context("opening data directory")?;

    let checks = verify::verify_store(&store).await?;
    let mut failed = 0usize;
    for check in &checks {
        for warning in &check.warnings {
            warn!(file = %check.name, "{warning}");
        }
        if check.is_ok() {
            info!(file = %check.name, rows = check.rows, "ok");
        } else {
            failed += 1;
            for problem in &check.problems {
                error!(file = %check.name, "{problem}");
            }
        }
    }
    info!(files = checks.len(), failed, "verify complete");

    if failed > 0 {
        bail!("{failed} snapshot file(s) failed verification");
    }
    Ok(())
}
