// Configuration source loading.
//
// Priority order:
// 1. Environment variables (GHLAKE_* prefix, plus standard AWS_* credentials)
// 2. Config file path from GHLAKE_CONFIG
// 3. Inline config content from GHLAKE_CONFIG_CONTENT
// 4. Default config files (./config.toml, ./.gharchive-lake.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::LakeConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_FILES: &[&str] = &["./config.toml", "./.gharchive-lake.toml"];

/// Load configuration using native environment/file access.
pub fn load_config() -> Result<LakeConfig> {
    let config = load_from_file()?.unwrap_or_default();
    finish(config, &StdEnvSource)
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<LakeConfig> {
    let config = read_config_file(path.as_ref())?;
    finish(config, &StdEnvSource)
}

fn finish<E: EnvSource>(mut config: LakeConfig, env_source: &E) -> Result<LakeConfig> {
    env_overrides::apply_env_overrides(&mut config, env_source)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<LakeConfig>> {
    if let Ok(path) = env::var(format!("{}CONFIG", ENV_PREFIX)) {
        return read_config_file(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var(format!("{}CONFIG_CONTENT", ENV_PREFIX)) {
        let config: LakeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from GHLAKE_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in DEFAULT_CONFIG_FILES {
        let path = Path::new(path);
        if path.exists() {
            return read_config_file(path).map(Some);
        }
    }

    Ok(None)
}

fn read_config_file(path: &Path) -> Result<LakeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageBackend;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0
                .get(format!("{}{}", ENV_PREFIX, key).as_str())
                .map(|v| v.to_string())
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    #[test]
    fn env_completes_a_partial_file() {
        let file = LakeConfig::from_toml_str(
            r#"
            [datalake]
            bronze_bucket = "bronze"
            silver_bucket = "silver"
            gold_bucket = "gold"
            "#,
        )
        .unwrap();

        let env = MapEnv(HashMap::from([
            ("AWS_ACCESS_KEY_ID", "key"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]));

        let config = finish(file, &env).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.s3.unwrap().access_key_id, "key");
    }

    #[test]
    fn missing_credentials_fail_validation() {
        let file = LakeConfig::from_toml_str(
            r#"
            [datalake]
            bronze_bucket = "bronze"
            silver_bucket = "silver"
            gold_bucket = "gold"
            "#,
        )
        .unwrap();

        let err = finish(file, &MapEnv(HashMap::new())).unwrap_err();
        assert!(err.to_string().contains("storage.s3"));
    }

    #[test]
    fn read_config_file_reports_path() {
        let err = read_config_file(Path::new("/nonexistent/gharchive-lake.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/gharchive-lake.toml"));
    }
}
