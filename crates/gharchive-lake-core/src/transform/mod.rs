//! Three-stage transform over one analytical session
//!
//! ```text
//! raw objects ──register_raw──▶ gharchive_raw ──clean──▶ gharchive_clean ──aggregate──▶ gharchive_agg
//!                       exported clean files ──load_clean──┘
//! ```
//!
//! Every stage is materialized in memory and replaces any table of the same
//! name, so re-running a stage on identical input yields identical tables.
//! Stage queries are built with the DataFrame API; no SQL text is generated.

mod aggregate;
mod clean;
mod error;
mod register;

pub use aggregate::{GroupKey, AGG_GROUP_KEYS, AGG_SORT_KEYS};
pub use clean::{CleanColumn, CLEAN_COLUMNS};
pub use error::{Result, TransformError};

use crate::schema::{agg_schema, clean_schema, conform_batch, Stage};
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use bytes::Bytes;
use datafusion::dataframe::DataFrame;
use datafusion::datasource::MemTable;
use datafusion::prelude::{SessionConfig, SessionContext};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default number of rows per decoded raw batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// One newline-delimited JSON source object, optionally gzip-compressed.
#[derive(Debug, Clone)]
pub struct RawObject {
    /// Object key; its suffix selects the decompression
    pub key: String,
    pub bytes: Bytes,
}

impl RawObject {
    pub fn new(key: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            bytes: bytes.into(),
        }
    }
}

/// Outcome of building one stage table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: Stage,
    pub rows: usize,
    /// Raw records dropped as malformed; always 0 past the raw stage
    pub skipped: usize,
}

/// Owner of the analytical session for one pipeline run.
///
/// The session runs with a single target partition, which keeps row order
/// deterministic. Closing the engine (or dropping it) releases the session.
pub struct TransformEngine {
    ctx: SessionContext,
    batch_size: usize,
    closed: bool,
}

impl TransformEngine {
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let config = SessionConfig::new()
            .with_target_partitions(1)
            .with_batch_size(batch_size);
        debug!(batch_size, "Opened transform session");
        Self {
            ctx: SessionContext::new_with_config(config),
            batch_size,
            closed: false,
        }
    }

    /// Decode raw objects and register them as the raw stage.
    #[instrument(skip_all, fields(objects = objects.len()))]
    pub async fn register_raw(&self, objects: &[RawObject]) -> Result<StageSummary> {
        if objects.is_empty() {
            return Err(TransformError::NoInput { stage: Stage::Raw });
        }

        let decoded = register::decode_objects(objects, self.batch_size)?;
        self.replace_table(Stage::Raw, decoded.schema, decoded.batches)?;

        let summary = StageSummary {
            stage: Stage::Raw,
            rows: decoded.rows,
            skipped: decoded.skipped,
        };
        info!(rows = summary.rows, skipped = summary.skipped, "Registered raw stage");
        Ok(summary)
    }

    /// Project the raw stage into the fixed clean schema.
    #[instrument(skip_all)]
    pub async fn clean(&self) -> Result<StageSummary> {
        let raw = self.table(Stage::Raw).await?;
        let projection = clean::clean_projection(raw.schema().as_arrow())
            .map_err(TransformError::stage(Stage::Clean))?;
        let batches = raw
            .select(projection)
            .map_err(TransformError::stage(Stage::Clean))?
            .collect()
            .await
            .map_err(TransformError::stage(Stage::Clean))?;

        let summary = self.store_conformed(Stage::Clean, clean_schema(), &batches)?;
        info!(rows = summary.rows, "Built clean stage");
        Ok(summary)
    }

    /// Register previously exported clean batches as the clean stage.
    #[instrument(skip_all, fields(batches = batches.len()))]
    pub async fn load_clean(&self, batches: &[RecordBatch]) -> Result<StageSummary> {
        if batches.is_empty() {
            return Err(TransformError::NoInput { stage: Stage::Clean });
        }

        let summary = self.store_conformed(Stage::Clean, clean_schema(), batches)?;
        info!(rows = summary.rows, "Loaded clean stage");
        Ok(summary)
    }

    /// Group the clean stage into the agg stage.
    #[instrument(skip_all)]
    pub async fn aggregate(&self) -> Result<StageSummary> {
        let clean = self.table(Stage::Clean).await?;
        let batches = aggregate::aggregate_plan(clean)
            .map_err(TransformError::stage(Stage::Agg))?
            .collect()
            .await
            .map_err(TransformError::stage(Stage::Agg))?;

        let summary = self.store_conformed(Stage::Agg, agg_schema(), &batches)?;
        info!(rows = summary.rows, "Built agg stage");
        Ok(summary)
    }

    /// Materialized rows of a stage, in stage order.
    pub async fn stage_batches(&self, stage: Stage) -> Result<Vec<RecordBatch>> {
        self.table(stage)
            .await?
            .collect()
            .await
            .map_err(TransformError::stage(stage))
    }

    pub async fn row_count(&self, stage: Stage) -> Result<usize> {
        self.table(stage)
            .await?
            .count()
            .await
            .map_err(TransformError::stage(stage))
    }

    /// Schema of a registered stage table.
    pub async fn stage_schema(&self, stage: Stage) -> Result<SchemaRef> {
        let df = self.table(stage).await?;
        Ok(Arc::new(df.schema().as_arrow().clone()))
    }

    /// Deregister every stage table and release the session.
    pub fn close(mut self) -> Result<()> {
        self.deregister_all()?;
        self.closed = true;
        debug!("Closed transform session");
        Ok(())
    }

    async fn table(&self, stage: Stage) -> Result<DataFrame> {
        self.ctx
            .table(stage.table_name())
            .await
            .map_err(TransformError::stage(stage))
    }

    fn store_conformed(
        &self,
        stage: Stage,
        schema: SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<StageSummary> {
        let conformed = batches
            .iter()
            .map(|batch| conform_batch(batch, &schema))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(TransformError::schema_mismatch(stage))?;
        let rows = conformed.iter().map(RecordBatch::num_rows).sum();

        self.replace_table(stage, schema, conformed)?;
        Ok(StageSummary {
            stage,
            rows,
            skipped: 0,
        })
    }

    /// Create-or-replace the stage table.
    fn replace_table(
        &self,
        stage: Stage,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<()> {
        let table = MemTable::try_new(schema, vec![batches]).map_err(TransformError::stage(stage))?;
        let name = stage.table_name();
        if self
            .ctx
            .deregister_table(name)
            .map_err(TransformError::stage(stage))?
            .is_some()
        {
            debug!(table = name, "Replacing stage table");
        }
        self.ctx
            .register_table(name, Arc::new(table))
            .map_err(TransformError::stage(stage))?;
        Ok(())
    }

    fn deregister_all(&mut self) -> Result<()> {
        for stage in Stage::ALL {
            self.ctx
                .deregister_table(stage.table_name())
                .map_err(TransformError::stage(stage))?;
        }
        Ok(())
    }
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TransformEngine {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.deregister_all() {
                debug!(error = %err, "Failed to deregister stage tables on drop");
            }
            debug!("Released transform session");
        }
    }
}
