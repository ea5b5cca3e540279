// Chunked object writes
//
// Objects are streamed through an OpenDAL writer in fixed-size chunks with
// progress logging. A failed upload is aborted so no partial object remains
// under the key.

use crate::encoding::ContentHash;
use crate::error::{Result, StorageError};
use bytes::Bytes;
use opendal::{Operator, Writer};
use tracing::{info, warn};

/// Outcome of one object write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Fully qualified path, e.g. `s3://lake-silver/gharchive/events/...`
    pub path: String,
    pub key: String,
    pub bytes: u64,
    /// Row count for Parquet exports; `None` for raw objects
    pub rows: Option<usize>,
    pub hash: ContentHash,
}

pub(crate) async fn write_chunked(
    operator: &Operator,
    path: &str,
    key: &str,
    data: Bytes,
    chunk_bytes: usize,
) -> Result<u64> {
    let chunk_bytes = chunk_bytes.max(1);
    let total = data.len();

    let mut writer = operator
        .writer_with(key)
        .chunk(chunk_bytes)
        .await
        .map_err(|e| StorageError::write_failure(path, e))?;

    let mut offset = 0;
    while offset < total {
        let end = (offset + chunk_bytes).min(total);
        if let Err(e) = writer.write(data.slice(offset..end)).await {
            abort(&mut writer, path).await;
            return Err(StorageError::write_failure(path, e));
        }
        offset = end;
        info!(
            path,
            written = offset,
            total,
            percent = offset * 100 / total,
            "Uploaded chunk"
        );
    }

    if let Err(e) = writer.close().await {
        abort(&mut writer, path).await;
        return Err(StorageError::write_failure(path, e));
    }

    info!(path, bytes = total, "Upload complete");
    Ok(total as u64)
}

async fn abort(writer: &mut Writer, path: &str) {
    if let Err(e) = writer.abort().await {
        warn!(path, error = %e, "Failed to abort partial upload");
    }
}
