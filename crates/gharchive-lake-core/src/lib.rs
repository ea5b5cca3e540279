// gharchive-lake-core - Storage-agnostic core logic
//
// Partition path derivation and the three-stage transform
// (register raw → clean → aggregate). No storage or network I/O:
// callers hand in raw bytes and take back Arrow record batches.

pub mod dataset;
pub mod partition;
pub mod schema;
pub mod timestamp;
pub mod transform;

// Re-export commonly used types
pub use dataset::{DatasetId, EmptyDatasetId};
pub use schema::{agg_schema, clean_schema, Stage};
pub use timestamp::{Granularity, ProcessTimestamp};
pub use transform::{RawObject, StageSummary, TransformEngine, TransformError};

/// Crate version, stamped into exported file metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
