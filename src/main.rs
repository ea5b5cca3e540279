use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use gharchive_lake::init::init_tracing;
use gharchive_lake::{HttpFetcher, Pipeline, RunReport};
use gharchive_lake_config::LakeConfig;
use gharchive_lake_core::ProcessTimestamp;
use gharchive_lake_storage::LakeStorage;
use std::path::PathBuf;
use tracing::info;

/// Move GH Archive hourly dumps through a bronze/silver/gold Parquet lake
#[derive(Parser)]
#[command(name = "gharchive-lake")]
#[command(version)]
#[command(about = "Move GH Archive hourly dumps through a bronze/silver/gold Parquet lake", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Fetch the previous completed hour into the bronze tier
    IngestHourly,
    /// Clean the previous completed hour into the silver tier
    SerializeHourly,
    /// Aggregate the previous completed day into the gold tier
    AggregateDaily,
}

impl Command {
    /// Partition processed when the command runs at `now`.
    fn process_timestamp(&self, now: DateTime<Utc>) -> ProcessTimestamp {
        match self {
            Command::IngestHourly | Command::SerializeHourly => ProcessTimestamp::previous_hour(now),
            Command::AggregateDaily => ProcessTimestamp::previous_day(now),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LakeConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LakeConfig::load().context("Failed to load configuration")?,
    };
    init_tracing(&config.logging);

    // Single-threaded by design: one run per process
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(run(cli.command, config))
}

async fn run(command: Command, config: LakeConfig) -> Result<()> {
    let storage = LakeStorage::from_config(&config)?;
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let pipeline = Pipeline::new(&config, storage, fetcher)?;

    let ts = command.process_timestamp(Utc::now());
    info!(command = ?command, timestamp = %ts, dataset = %pipeline.dataset(), "Starting run");

    let report = match command {
        Command::IngestHourly => pipeline.ingest_hourly(ts).await?,
        Command::SerializeHourly => pipeline.serialize_hourly(ts).await?,
        Command::AggregateDaily => pipeline.aggregate_daily(ts).await?,
    };
    log_report(&report);
    Ok(())
}

fn log_report(report: &RunReport) {
    info!(
        run = %report.kind,
        timestamp = %report.timestamp,
        inputs = report.inputs.len(),
        output = %report.output.path,
        bytes = report.output.bytes,
        rows = ?report.rows,
        skipped = report.skipped,
        hash = %report.output.hash,
        "Run complete"
    );
}
