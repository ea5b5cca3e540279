use crate::{FsConfig, LakeConfig, LogFormat, S3Config, StorageBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "GHLAKE_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the GHLAKE_ prefix
    /// Used for AWS standard variables (AWS_ACCESS_KEY_ID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut LakeConfig, env: &E) -> Result<()> {
    if let Some(dataset) = get_env_string(env, "DATASET")? {
        config.dataset = dataset;
    }
    if let Some(base_url) = get_env_string(env, "SOURCE_BASE_URL")? {
        config.source.base_url = base_url;
    }

    // Tier buckets
    if let Some(bucket) = get_env_string(env, "BRONZE_BUCKET")? {
        config.datalake.bronze_bucket = bucket;
    }
    if let Some(bucket) = get_env_string(env, "SILVER_BUCKET")? {
        config.datalake.silver_bucket = bucket;
    }
    if let Some(bucket) = get_env_string(env, "GOLD_BUCKET")? {
        config.datalake.gold_bucket = bucket;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND")? {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid GHLAKE_STORAGE_BACKEND value")?;
    }
    if let Some(row_group_size) = get_env_usize(env, "PARQUET_ROW_GROUP_SIZE")? {
        config.storage.parquet_row_group_size = row_group_size;
    }
    if let Some(chunk) = get_env_usize(env, "UPLOAD_CHUNK_BYTES")? {
        config.storage.upload_chunk_bytes = chunk;
    }

    // Filesystem storage
    if let Some(path) = get_env_string(env, "STORAGE_PATH")? {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // S3 storage: prefixed names win over the AWS standard ones
    if let Some(key) = first_of(env, "S3_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID")? {
        ensure_s3(config).access_key_id = key;
    }
    if let Some(secret) = first_of(env, "S3_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY")? {
        ensure_s3(config).secret_access_key = secret;
    }
    if let Some(region) = first_of(env, "S3_REGION", "AWS_REGION")? {
        ensure_s3(config).region = Some(region);
    }
    if let Some(endpoint) = first_of(env, "S3_ENDPOINT", "AWS_ENDPOINT_URL")? {
        ensure_s3(config).endpoint = Some(endpoint);
    }

    Ok(())
}

fn ensure_s3(config: &mut LakeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(S3Config::default)
}

fn first_of<E: EnvSource>(env: &E, prefixed: &str, raw: &str) -> Result<Option<String>> {
    match get_env_string(env, prefixed)? {
        Some(value) => Ok(Some(value)),
        None => get_raw_env_string(env, raw),
    }
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
}

fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env
        .get_raw(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {}{} value '{}': {}", ENV_PREFIX, key, value, e)),
        None => Ok(None),
    }
}
