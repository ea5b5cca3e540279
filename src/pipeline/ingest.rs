// Hourly ingest: source file → bronze tier, stored byte for byte

use super::{log_failure, Pipeline, RunKind, RunReport};
use crate::error::Result;
use crate::fetch::SourceFetcher;
use gharchive_lake_config::Tier;
use gharchive_lake_core::partition::{sink_key, source_file_name, source_url};
use gharchive_lake_core::ProcessTimestamp;
use tracing::{info, instrument};

impl<F: SourceFetcher> Pipeline<F> {
    /// Fetch the hour's source dump and store it in bronze.
    ///
    /// A fetch failure aborts before anything is written.
    #[instrument(skip_all, fields(timestamp = %ts))]
    pub async fn ingest_hourly(&self, ts: ProcessTimestamp) -> Result<RunReport> {
        log_failure(RunKind::Ingest, ts, self.ingest(ts).await)
    }

    async fn ingest(&self, ts: ProcessTimestamp) -> Result<RunReport> {
        let url = source_url(&self.source_base_url, ts);
        let key = sink_key(&self.dataset, ts, &source_file_name(ts));
        info!(
            url = %url,
            sink = %self.storage.path(Tier::Bronze, &key),
            "Ingesting source file"
        );

        let body = self.fetcher.fetch(&url).await?;
        let output = self.storage.put(Tier::Bronze, &key, body).await?;
        info!(path = %output.path, bytes = output.bytes, hash = %output.hash, "Ingest complete");

        Ok(RunReport {
            kind: RunKind::Ingest,
            timestamp: ts,
            inputs: vec![url],
            output,
            rows: None,
            skipped: 0,
        })
    }
}
