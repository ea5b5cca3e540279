//! Pipeline orchestration
//!
//! One run moves one partition one tier forward:
//!
//! - `ingest_hourly`:    source URL      → bronze `{dataset}/YYYY-MM-DD/HH/YYYY-MM-DD-H.json.gz`
//! - `serialize_hourly`: bronze hour     → silver `{dataset}/YYYY-MM-DD/HH/clean_YYYYMMDD_HH.parquet`
//! - `aggregate_daily`:  silver day      → gold   `{dataset}/YYYY-MM-DD/agg_YYYYMMDD.parquet`
//!
//! Runs are single-pass: a failure is logged, aborts the run and is returned.
//! Each transforming run owns its own engine and closes it on every path.

mod aggregate;
mod ingest;
mod serialize;

use crate::error::{PipelineError, Result};
use crate::fetch::SourceFetcher;
use gharchive_lake_config::LakeConfig;
use gharchive_lake_core::{DatasetId, ProcessTimestamp, TransformEngine};
use gharchive_lake_storage::{LakeStorage, WriteReceipt};
use std::fmt;
use tracing::error;

/// Which of the three runs produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Ingest,
    Serialize,
    Aggregate,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Ingest => f.write_str("ingest"),
            RunKind::Serialize => f.write_str("serialize"),
            RunKind::Aggregate => f.write_str("aggregate"),
        }
    }
}

/// Summary of one completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub kind: RunKind,
    pub timestamp: ProcessTimestamp,
    /// Source URL or storage keys read by the run
    pub inputs: Vec<String>,
    pub output: WriteReceipt,
    /// Rows in the written stage; `None` for raw ingests
    pub rows: Option<usize>,
    /// Malformed raw records dropped while registering
    pub skipped: usize,
}

/// Drives the three runs for one dataset
pub struct Pipeline<F> {
    dataset: DatasetId,
    source_base_url: String,
    storage: LakeStorage,
    fetcher: F,
}

impl<F: SourceFetcher> Pipeline<F> {
    pub fn new(config: &LakeConfig, storage: LakeStorage, fetcher: F) -> Result<Self> {
        let dataset =
            DatasetId::new(&config.dataset).map_err(|e| PipelineError::Config(e.into()))?;
        Ok(Self {
            dataset,
            source_base_url: config.source.base_url.clone(),
            storage,
            fetcher,
        })
    }

    pub fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    pub fn storage(&self) -> &LakeStorage {
        &self.storage
    }
}

/// Release the engine on every path; a run error takes precedence over a
/// failure to close.
fn close_engine<T>(engine: TransformEngine, result: Result<T>) -> Result<T> {
    let closed = engine.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// Log a run failure at detection and hand it back unchanged.
fn log_failure<T>(kind: RunKind, ts: ProcessTimestamp, result: Result<T>) -> Result<T> {
    result.inspect_err(|err| error!(run = %kind, timestamp = %ts, error = %err, "Run failed"))
}
