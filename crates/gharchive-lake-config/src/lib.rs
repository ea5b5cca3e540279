// gharchive-lake-config - Explicit configuration for every pipeline run
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Explicit config file path (CLI --config)
// 3. Config file path from GHLAKE_CONFIG env var
// 4. Config file contents from GHLAKE_CONFIG_CONTENT env var
// 5. Default config file locations (./config.toml, ./.gharchive-lake.toml)
// 6. Built-in defaults (lowest priority)
//
// The loaded `LakeConfig` is passed by reference into the storage layer and
// the pipeline; nothing reads configuration from ambient state after load.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};

/// Default GH Archive host serving the hourly dumps.
pub const DEFAULT_SOURCE_BASE_URL: &str = "https://data.gharchive.org";

/// Default dataset base path inside every tier bucket.
pub const DEFAULT_DATASET: &str = "gharchive/events";

/// Main runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LakeConfig {
    /// Key prefix scoping every partition of the dataset (e.g. "gharchive/events")
    #[serde(default = "default_dataset")]
    pub dataset: String,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub datalake: DatalakeConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_dataset() -> String {
    DEFAULT_DATASET.to_string()
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            source: SourceConfig::default(),
            datalake: DatalakeConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Upstream source of the hourly event dumps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_BASE_URL.to_string(),
        }
    }
}

/// Bucket names for the three lake tiers. All three are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatalakeConfig {
    #[serde(default)]
    pub bronze_bucket: String,
    #[serde(default)]
    pub silver_bucket: String,
    #[serde(default)]
    pub gold_bucket: String,
}

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    #[serde(default = "default_parquet_row_group_size")]
    pub parquet_row_group_size: usize,

    /// Chunk size used when streaming uploads; progress is reported per chunk.
    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

fn default_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_parquet_row_group_size() -> usize {
    32 * 1024
}

fn default_upload_chunk_bytes() -> usize {
    8 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            parquet_row_group_size: default_parquet_row_group_size(),
            upload_chunk_bytes: default_upload_chunk_bytes(),
            fs: None,
            s3: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" | "minio" => Ok(StorageBackend::S3),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3", s),
        }
    }
}

/// Local filesystem root; each tier bucket becomes a sub-directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

/// S3-compatible credentials shared by all three tier buckets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Lake tier addressed by a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Bronze, Tier::Silver, Tier::Gold];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DatalakeConfig {
    /// Bucket name for the given tier
    pub fn bucket(&self, tier: Tier) -> &str {
        match tier {
            Tier::Bronze => &self.bronze_bucket,
            Tier::Silver => &self.silver_bucket,
            Tier::Gold => &self.gold_bucket,
        }
    }
}

impl LakeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration starting from an explicit file (CLI `--config`).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse a TOML document without applying environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
