// Configuration validation
//
// Missing bucket names or credentials are configuration errors; they are
// reported here so a run never starts half-configured.

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &LakeConfig) -> Result<()> {
    if config.dataset.trim_matches('/').trim().is_empty() {
        bail!("dataset must not be empty");
    }

    if config.source.base_url.trim().is_empty() {
        bail!("source.base_url must not be empty");
    }

    validate_datalake_config(&config.datalake)?;
    validate_storage_config(&config.storage)?;

    Ok(())
}

fn validate_datalake_config(config: &DatalakeConfig) -> Result<()> {
    for tier in Tier::ALL {
        if config.bucket(tier).trim().is_empty() {
            bail!("datalake.{}_bucket is required", tier);
        }
    }

    if config.bronze_bucket == config.silver_bucket || config.silver_bucket == config.gold_bucket {
        warn!("datalake tiers share a bucket; partitions are still separated by key layout");
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.parquet_row_group_size == 0 {
        bail!("storage.parquet_row_group_size must be greater than 0");
    }

    if config.upload_chunk_bytes == 0 {
        bail!("storage.upload_chunk_bytes must be greater than 0");
    }

    match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                anyhow::anyhow!("fs storage backend requires 'storage.fs' configuration")
            })?;

            if fs.path.is_empty() {
                bail!("storage.fs.path must not be empty");
            }
        }
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                anyhow::anyhow!("s3 storage backend requires 'storage.s3' configuration")
            })?;

            if s3.access_key_id.is_empty() {
                bail!("storage.s3.access_key_id is required for S3 backend");
            }

            if s3.secret_access_key.is_empty() {
                bail!("storage.s3.secret_access_key is required for S3 backend");
            }
        }
    }

    Ok(())
}
