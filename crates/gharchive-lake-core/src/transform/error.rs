//! Error types for the transform stages

use crate::schema::Stage;
use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use thiserror::Error;

/// Errors raised while building stage tables
#[derive(Debug, Error)]
pub enum TransformError {
    /// A stage query failed inside the analytical session
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: DataFusionError,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("failed to decompress '{key}': {source}")]
    Decompress {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported compression '{extension}' for '{key}'")]
    UnsupportedCompression { key: String, extension: String },

    /// The stage was asked to run on zero input objects or batches
    #[error("no input for the {stage} stage")]
    NoInput { stage: Stage },

    #[error("{stage} stage schema mismatch: {reason}")]
    SchemaMismatch { stage: Stage, reason: String },
}

impl TransformError {
    pub(crate) fn stage(stage: Stage) -> impl FnOnce(DataFusionError) -> Self {
        move |source| Self::Stage { stage, source }
    }

    pub(crate) fn schema_mismatch(stage: Stage) -> impl FnOnce(ArrowError) -> Self {
        move |err| Self::SchemaMismatch {
            stage,
            reason: err.to_string(),
        }
    }
}

/// Result type alias for TransformError
pub type Result<T> = std::result::Result<T, TransformError>;
