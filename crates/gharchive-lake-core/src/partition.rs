//! Partition path generation for time-based organization
//!
//! Every storage location in the lake is derived from a dataset identity and
//! a `ProcessTimestamp`:
//!
//! - source file:   `YYYY-MM-DD-H.json.gz` (hour NOT zero-padded, upstream convention)
//! - partition:     `YYYY-MM-DD` or `YYYY-MM-DD/HH` (hour zero-padded)
//! - export file:   `{stage}_YYYYMMDD[_HH].parquet`
//!
//! The two hour encodings are intentionally different and must not be mixed:
//! the source name has to match what GH Archive publishes, while partition
//! directories sort lexicographically.

use crate::dataset::DatasetId;
use crate::schema::Stage;
use crate::timestamp::{Granularity, ProcessTimestamp};

/// Extension of the hourly source dumps.
pub const SOURCE_EXTENSION: &str = "json.gz";

/// Extension of exported stage files.
pub const EXPORT_EXTENSION: &str = "parquet";

/// Compression suffixes recognised when stripping file extensions.
pub const COMPRESSION_EXTENSIONS: &[&str] = &[".gz", ".bz2", ".zip", ".xz", ".zst"];

/// Source dump name for the hour, e.g. `2023-01-05-3.json.gz`.
pub fn source_file_name(ts: ProcessTimestamp) -> String {
    // %-H drops the leading zero
    format!(
        "{}.{}",
        ts.as_naive().format("%Y-%m-%d-%-H"),
        SOURCE_EXTENSION
    )
}

/// Full URL of the hourly source dump.
pub fn source_url(base_url: &str, ts: ProcessTimestamp) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), source_file_name(ts))
}

/// `YYYY-MM-DD` or `YYYY-MM-DD/HH`.
pub fn partition_path(ts: ProcessTimestamp, granularity: Granularity) -> String {
    let format = match granularity {
        Granularity::Hourly => "%Y-%m-%d/%H",
        Granularity::Daily => "%Y-%m-%d",
    };
    ts.as_naive().format(format).to_string()
}

/// Object key for an hourly artifact: `{dataset}/YYYY-MM-DD/HH/{filename}`.
pub fn sink_key(dataset: &DatasetId, ts: ProcessTimestamp, filename: &str) -> String {
    format!(
        "{}/{}/{}",
        dataset,
        partition_path(ts, Granularity::Hourly),
        filename
    )
}

/// Export file name, e.g. `clean_20230105_03.parquet` or `agg_20230105.parquet`.
pub fn export_filename(stage: Stage, ts: ProcessTimestamp, granularity: Granularity) -> String {
    let format = match granularity {
        Granularity::Hourly => "%Y%m%d_%H",
        Granularity::Daily => "%Y%m%d",
    };
    format!(
        "{}_{}.{}",
        stage.as_str(),
        ts.as_naive().format(format),
        EXPORT_EXTENSION
    )
}

/// Object key of a stage export at the given granularity.
pub fn export_key(
    dataset: &DatasetId,
    stage: Stage,
    ts: ProcessTimestamp,
    granularity: Granularity,
) -> String {
    format!(
        "{}/{}/{}",
        dataset,
        partition_path(ts, granularity),
        export_filename(stage, ts, granularity)
    )
}

/// Bucket-relative read glob for a partition.
///
/// Hourly globs match every object of one hour; daily globs match the Parquet
/// files of every hourly sub-partition of the day. Glob syntax in the dataset
/// is escaped so it only ever matches itself.
pub fn glob_key(dataset: &DatasetId, ts: ProcessTimestamp, granularity: Granularity) -> String {
    let dataset = globset::escape(dataset.as_str());
    let partition = partition_path(ts, granularity);
    match granularity {
        Granularity::Hourly => format!("{}/{}/*", dataset, partition),
        Granularity::Daily => format!("{}/{}/*/*.{}", dataset, partition, EXPORT_EXTENSION),
    }
}

/// Fully qualified read glob, e.g. `s3://lake-bronze/gharchive/events/2023-01-05/03/*`.
pub fn glob_path(
    bucket: &str,
    dataset: &DatasetId,
    ts: ProcessTimestamp,
    granularity: Granularity,
) -> String {
    sink_path(bucket, &glob_key(dataset, ts, granularity))
}

/// Fully qualified object path, used for logging.
pub fn sink_path(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}

/// Last path segment of an object path, with or without an `s3://` scheme.
pub fn file_name_from_path(path: &str) -> &str {
    let without_scheme = path.strip_prefix("s3://").unwrap_or(path);
    without_scheme
        .rsplit('/')
        .next()
        .unwrap_or(without_scheme)
}

/// Recognised compression suffix of `filename`, if any (e.g. `.gz`).
pub fn compression_extension(filename: &str) -> Option<&str> {
    let (_, ext) = split_extension(filename);
    is_compression_extension(ext).then_some(ext)
}

/// Logical name of a file: drops its extension, plus the container extension
/// beneath a recognised compression suffix.
///
/// At most two segments are ever removed:
/// `file.tar.gz` → `file`, `file.with.dots.txt` → `file.with.dots`.
pub fn strip_known_compression_extension(filename: &str) -> String {
    let (stem, ext) = split_extension(filename);
    if is_compression_extension(ext) {
        split_extension(stem).0.to_string()
    } else {
        stem.to_string()
    }
}

fn is_compression_extension(ext: &str) -> bool {
    !ext.is_empty()
        && COMPRESSION_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
}

/// Split off the last extension (including its dot). Leading dots do not
/// start an extension, so `.env` has none.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}
