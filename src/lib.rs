// gharchive-lake - GH Archive hourly dumps into a bronze/silver/gold data lake
//
// The binary wires configuration, storage and the HTTP fetcher into a
// `Pipeline`; the pure logic lives in the workspace crates:
// - gharchive-lake-core:    partition paths and the staged transform
// - gharchive-lake-storage: per-tier object storage and Parquet export
// - gharchive-lake-config:  layered configuration

pub mod error;
pub mod fetch;
pub mod init;
pub mod pipeline;

pub use error::{PipelineError, Result};
pub use fetch::{FetchError, HttpFetcher, SourceFetcher};
pub use pipeline::{Pipeline, RunKind, RunReport};
