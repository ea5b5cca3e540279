// Parquet encoding for stage exports
//
// Encodes Arrow batches into an in-memory Parquet file and computes a Blake3
// content hash while encoding. Identical batches produce identical bytes.

use crate::error::{Result, StorageError};
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use bytes::Bytes;
use gharchive_lake_core::Stage;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use std::fmt;
use std::io::{self, Write};

/// Parquet key-value metadata keys stamped on every export
pub const VERSION_METADATA_KEY: &str = "gharchive_lake.version";
pub const STAGE_METADATA_KEY: &str = "gharchive_lake.stage";

struct HashingBuffer {
    buffer: Vec<u8>,
    hasher: blake3::Hasher,
}

impl HashingBuffer {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            hasher: blake3::Hasher::new(),
        }
    }

    fn finish(self) -> (Vec<u8>, ContentHash) {
        let hash = self.hasher.finalize();
        (self.buffer, ContentHash::new(*hash.as_bytes()))
    }
}

impl Write for HashingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Blake3 hash of an encoded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Hash arbitrary bytes, e.g. a raw object that is stored as is.
    pub fn of(data: &[u8]) -> Self {
        Self::new(*blake3::hash(data).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn compression_setting() -> Compression {
    let level = ZstdLevel::try_new(3).unwrap_or_default();
    Compression::ZSTD(level)
}

/// Writer properties for one stage export
///
/// - ZSTD compression
/// - Dictionary encoding and page statistics enabled
/// - Configurable rows per group (32k by default)
/// - Version and stage embedded in the file metadata
pub fn writer_properties(stage: Stage, row_group_size: usize) -> WriterProperties {
    let metadata = vec![
        KeyValue::new(
            VERSION_METADATA_KEY.to_string(),
            gharchive_lake_core::VERSION.to_string(),
        ),
        KeyValue::new(STAGE_METADATA_KEY.to_string(), stage.as_str().to_string()),
    ];

    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(compression_setting())
        .set_data_page_size_limit(256 * 1024)
        .set_write_batch_size(32 * 1024)
        .set_max_row_group_size(row_group_size.max(1))
        .set_dictionary_page_size_limit(128 * 1024)
        .set_key_value_metadata(Some(metadata))
        .build()
}

/// Result of encoding Arrow record batches into Parquet bytes.
#[derive(Debug)]
pub struct EncodedParquet {
    pub bytes: Bytes,
    pub hash: ContentHash,
    pub rows: usize,
}

/// Encode `batches` into one Parquet file with `schema`.
///
/// An empty batch list still produces a valid file with zero rows, so a
/// partition without events is exported rather than left missing.
pub fn encode_batches(
    path: &str,
    schema: &SchemaRef,
    batches: &[RecordBatch],
    properties: WriterProperties,
) -> Result<EncodedParquet> {
    let mut sink = HashingBuffer::new();
    let mut rows = 0;
    {
        let mut writer = ArrowWriter::try_new(&mut sink, schema.clone(), Some(properties))
            .map_err(|e| StorageError::encode_failure(path, e))?;

        for batch in batches {
            if batch.schema().fields() != schema.fields() {
                return Err(StorageError::encode_failure(
                    path,
                    "all batches must share the export schema",
                ));
            }
            writer
                .write(batch)
                .map_err(|e| StorageError::encode_failure(path, e))?;
            rows += batch.num_rows();
        }

        writer
            .close()
            .map_err(|e| StorageError::encode_failure(path, e))?;
    }

    let (buffer, hash) = sink.finish();
    Ok(EncodedParquet {
        bytes: Bytes::from(buffer),
        hash,
        rows,
    })
}

/// Decode a Parquet file back into record batches.
pub fn decode_batches(path: &str, bytes: Bytes) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .and_then(|builder| builder.build())
        .map_err(|e| StorageError::encode_failure(path, e))?;

    reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::encode_failure(path, e))
}
