//! Per-tier object storage handles
//!
//! Each lake tier (bronze, silver, gold) gets its own OpenDAL operator rooted
//! at its bucket, so keys are always bucket-relative.

use crate::encoding::{decode_batches, encode_batches, writer_properties, ContentHash};
use crate::error::{Result, StorageError};
use crate::read::list_matching;
use crate::write::{write_chunked, WriteReceipt};
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use bytes::Bytes;
use gharchive_lake_config::{DatalakeConfig, LakeConfig, StorageBackend, StorageConfig, Tier};
use gharchive_lake_core::partition::sink_path;
use gharchive_lake_core::{RawObject, Stage};
use opendal::{services, ErrorKind, Operator};
use std::path::Path;
use tracing::{debug, info};

/// Region used when an S3 backend does not name one.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Write tuning shared by every tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub upload_chunk_bytes: usize,
    pub parquet_row_group_size: usize,
}

impl From<&StorageConfig> for WriteOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            upload_chunk_bytes: config.upload_chunk_bytes,
            parquet_row_group_size: config.parquet_row_group_size,
        }
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions::from(&StorageConfig::default())
    }
}

#[derive(Debug, Clone)]
struct TierStore {
    bucket: String,
    operator: Operator,
}

/// Storage for the three lake tiers
#[derive(Debug, Clone)]
pub struct LakeStorage {
    bronze: TierStore,
    silver: TierStore,
    gold: TierStore,
    options: WriteOptions,
}

impl LakeStorage {
    /// Build one operator per tier from the configured backend.
    pub fn from_config(config: &LakeConfig) -> Result<Self> {
        info!(
            backend = %config.storage.backend,
            bronze = %config.datalake.bronze_bucket,
            silver = %config.datalake.silver_bucket,
            gold = %config.datalake.gold_bucket,
            "Initializing lake storage"
        );

        let store = |tier: Tier| -> Result<TierStore> {
            let bucket = config.datalake.bucket(tier);
            Ok(TierStore {
                bucket: bucket.to_string(),
                operator: build_operator(&config.storage, bucket)?,
            })
        };

        Ok(Self {
            bronze: store(Tier::Bronze)?,
            silver: store(Tier::Silver)?,
            gold: store(Tier::Gold)?,
            options: WriteOptions::from(&config.storage),
        })
    }

    /// Wrap caller-built operators, one per tier, e.g. in-memory stores.
    pub fn from_operators(
        datalake: &DatalakeConfig,
        mut operator_for: impl FnMut(Tier) -> Operator,
    ) -> Self {
        let store = |tier: Tier, operator: Operator| TierStore {
            bucket: datalake.bucket(tier).to_string(),
            operator,
        };
        Self {
            bronze: store(Tier::Bronze, operator_for(Tier::Bronze)),
            silver: store(Tier::Silver, operator_for(Tier::Silver)),
            gold: store(Tier::Gold, operator_for(Tier::Gold)),
            options: WriteOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> WriteOptions {
        self.options
    }

    fn tier(&self, tier: Tier) -> &TierStore {
        match tier {
            Tier::Bronze => &self.bronze,
            Tier::Silver => &self.silver,
            Tier::Gold => &self.gold,
        }
    }

    pub fn bucket(&self, tier: Tier) -> &str {
        &self.tier(tier).bucket
    }

    pub fn operator(&self, tier: Tier) -> &Operator {
        &self.tier(tier).operator
    }

    /// Fully qualified path of `key` in `tier`, for logs and receipts.
    pub fn path(&self, tier: Tier, key: &str) -> String {
        sink_path(self.bucket(tier), key)
    }

    /// Store `data` under `key` as is.
    pub async fn put(&self, tier: Tier, key: &str, data: Bytes) -> Result<WriteReceipt> {
        let path = self.path(tier, key);
        let hash = ContentHash::of(&data);
        let bytes = write_chunked(
            self.operator(tier),
            &path,
            key,
            data,
            self.options.upload_chunk_bytes,
        )
        .await?;

        Ok(WriteReceipt {
            path,
            key: key.to_string(),
            bytes,
            rows: None,
            hash,
        })
    }

    /// Encode a stage export as Parquet and store it under `key`, replacing
    /// any previous export.
    pub async fn write_parquet(
        &self,
        tier: Tier,
        key: &str,
        stage: Stage,
        schema: &SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<WriteReceipt> {
        let path = self.path(tier, key);
        let properties = writer_properties(stage, self.options.parquet_row_group_size);
        let encoded = encode_batches(&path, schema, batches, properties)?;
        debug!(
            path = %path,
            stage = %stage,
            rows = encoded.rows,
            bytes = encoded.bytes.len(),
            hash = %encoded.hash,
            "Encoded stage export"
        );

        let bytes = write_chunked(
            self.operator(tier),
            &path,
            key,
            encoded.bytes,
            self.options.upload_chunk_bytes,
        )
        .await?;

        Ok(WriteReceipt {
            path,
            key: key.to_string(),
            bytes,
            rows: Some(encoded.rows),
            hash: encoded.hash,
        })
    }

    /// Sorted keys in `tier` matching the bucket-relative glob `pattern`.
    pub async fn list_glob(&self, tier: Tier, pattern: &str) -> Result<Vec<String>> {
        list_matching(self.operator(tier), &self.path(tier, pattern), pattern).await
    }

    /// Read every object matching `pattern`, in key order.
    pub async fn read_glob(&self, tier: Tier, pattern: &str) -> Result<Vec<RawObject>> {
        let keys = self.list_glob(tier, pattern).await?;
        let mut objects = Vec::with_capacity(keys.len());
        for key in keys {
            let data = self.read(tier, &key).await?;
            objects.push(RawObject::new(key, data));
        }
        Ok(objects)
    }

    /// Decode the Parquet file stored under `key`.
    pub async fn read_parquet(&self, tier: Tier, key: &str) -> Result<Vec<RecordBatch>> {
        let data = self.read(tier, key).await?;
        decode_batches(&self.path(tier, key), data)
    }

    pub async fn read(&self, tier: Tier, key: &str) -> Result<Bytes> {
        self.operator(tier)
            .read(key)
            .await
            .map(|buffer| buffer.to_bytes())
            .map_err(|e| StorageError::read_failure(self.path(tier, key), e))
    }

    pub async fn exists(&self, tier: Tier, key: &str) -> Result<bool> {
        match self.operator(tier).stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::read_failure(self.path(tier, key), e)),
        }
    }
}

/// Build the operator for one bucket of the configured backend.
fn build_operator(config: &StorageConfig, bucket: &str) -> Result<Operator> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                StorageError::invalid_config("fs config required for filesystem backend")
            })?;

            // each bucket is a sub-directory of the storage root
            let root = Path::new(&fs.path).join(bucket);
            let builder = services::Fs::default().root(&root.to_string_lossy());
            debug!(root = %root.display(), "Using filesystem storage");

            Ok(Operator::new(builder)
                .map_err(|e| {
                    StorageError::invalid_config(format!(
                        "Failed to create filesystem operator: {}",
                        e
                    ))
                })?
                .finish())
        }
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                StorageError::invalid_config("s3 config required for S3 backend")
            })?;

            let region = s3.region.as_deref().unwrap_or(DEFAULT_S3_REGION);
            let mut builder = services::S3::default()
                .bucket(bucket)
                .region(region)
                .access_key_id(&s3.access_key_id)
                .secret_access_key(&s3.secret_access_key);

            if let Some(endpoint) = &s3.endpoint {
                builder = builder.endpoint(endpoint);
            }
            debug!(bucket, region, endpoint = ?s3.endpoint, "Using S3 storage");

            Ok(Operator::new(builder)
                .map_err(|e| {
                    StorageError::invalid_config(format!("Failed to create S3 operator: {}", e))
                })?
                .finish())
        }
    }
}
