//! Pipeline error taxonomy
//!
//! Every failure is logged where it is detected and then returned unchanged;
//! nothing is retried or recovered inside a run.

use crate::fetch::FetchError;
use gharchive_lake_core::TransformError;
use gharchive_lake_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Write(#[from] StorageError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),
}

/// Result type alias for PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;
