// Hourly serialize: bronze hour → clean stage → silver Parquet

use super::{close_engine, log_failure, Pipeline, RunKind, RunReport};
use crate::error::Result;
use crate::fetch::SourceFetcher;
use gharchive_lake_config::Tier;
use gharchive_lake_core::partition::{export_key, glob_key};
use gharchive_lake_core::{clean_schema, Granularity, ProcessTimestamp, Stage, TransformEngine};
use tracing::{info, instrument};

impl<F: SourceFetcher> Pipeline<F> {
    /// Register every bronze object of the hour, clean it and export the
    /// clean stage to silver.
    #[instrument(skip_all, fields(timestamp = %ts))]
    pub async fn serialize_hourly(&self, ts: ProcessTimestamp) -> Result<RunReport> {
        let engine = TransformEngine::new();
        let result = self.serialize(&engine, ts).await;
        log_failure(RunKind::Serialize, ts, close_engine(engine, result))
    }

    async fn serialize(&self, engine: &TransformEngine, ts: ProcessTimestamp) -> Result<RunReport> {
        let pattern = glob_key(&self.dataset, ts, Granularity::Hourly);
        info!(glob = %self.storage.path(Tier::Bronze, &pattern), "Reading raw objects");
        let objects = self.storage.read_glob(Tier::Bronze, &pattern).await?;
        let inputs = objects.iter().map(|o| o.key.clone()).collect();

        let registered = engine.register_raw(&objects).await?;
        engine.clean().await?;
        let batches = engine.stage_batches(Stage::Clean).await?;

        let key = export_key(&self.dataset, Stage::Clean, ts, Granularity::Hourly);
        let output = self
            .storage
            .write_parquet(Tier::Silver, &key, Stage::Clean, &clean_schema(), &batches)
            .await?;
        info!(
            path = %output.path,
            rows = ?output.rows,
            skipped = registered.skipped,
            hash = %output.hash,
            "Serialize complete"
        );

        Ok(RunReport {
            kind: RunKind::Serialize,
            timestamp: ts,
            inputs,
            rows: output.rows,
            output,
            skipped: registered.skipped,
        })
    }
}
