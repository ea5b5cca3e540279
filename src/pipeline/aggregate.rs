// Daily aggregate: silver clean exports of one day → agg stage → gold Parquet

use super::{close_engine, log_failure, Pipeline, RunKind, RunReport};
use crate::error::Result;
use crate::fetch::SourceFetcher;
use arrow::array::RecordBatch;
use gharchive_lake_config::Tier;
use gharchive_lake_core::partition::{export_key, glob_key};
use gharchive_lake_core::{
    agg_schema, clean_schema, Granularity, ProcessTimestamp, Stage, TransformEngine,
    TransformError,
};
use tracing::{info, instrument};

impl<F: SourceFetcher> Pipeline<F> {
    /// Load every hourly clean export of the day, aggregate it and export
    /// the agg stage to gold.
    #[instrument(skip_all, fields(timestamp = %ts))]
    pub async fn aggregate_daily(&self, ts: ProcessTimestamp) -> Result<RunReport> {
        let ts = ts.day_start();
        let engine = TransformEngine::new();
        let result = self.aggregate(&engine, ts).await;
        log_failure(RunKind::Aggregate, ts, close_engine(engine, result))
    }

    async fn aggregate(&self, engine: &TransformEngine, ts: ProcessTimestamp) -> Result<RunReport> {
        let pattern = glob_key(&self.dataset, ts, Granularity::Daily);
        info!(glob = %self.storage.path(Tier::Silver, &pattern), "Reading clean exports");
        let keys = self.storage.list_glob(Tier::Silver, &pattern).await?;
        if keys.is_empty() {
            return Err(TransformError::NoInput { stage: Stage::Clean }.into());
        }

        let mut batches = Vec::new();
        for key in &keys {
            batches.extend(self.storage.read_parquet(Tier::Silver, key).await?);
        }
        if batches.is_empty() {
            // every export of the day has zero rows
            batches.push(RecordBatch::new_empty(clean_schema()));
        }

        engine.load_clean(&batches).await?;
        engine.aggregate().await?;
        let aggregated = engine.stage_batches(Stage::Agg).await?;

        let key = export_key(&self.dataset, Stage::Agg, ts, Granularity::Daily);
        let output = self
            .storage
            .write_parquet(Tier::Gold, &key, Stage::Agg, &agg_schema(), &aggregated)
            .await?;
        info!(
            path = %output.path,
            files = keys.len(),
            rows = ?output.rows,
            hash = %output.hash,
            "Aggregate complete"
        );

        Ok(RunReport {
            kind: RunKind::Aggregate,
            timestamp: ts,
            inputs: keys,
            rows: output.rows,
            output,
            skipped: 0,
        })
    }
}
