//! Dataset identity: the key prefix scoping every partition of one dataset.

use std::fmt;

/// Opaque dataset base path such as `gharchive/events`.
///
/// Surrounding `/` are trimmed so joined keys never contain `//`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetId(String);

/// Returned when a dataset identity is empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dataset base path must not be empty")]
pub struct EmptyDatasetId;

impl DatasetId {
    pub fn new(base_path: impl AsRef<str>) -> Result<Self, EmptyDatasetId> {
        let trimmed = base_path.as_ref().trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(EmptyDatasetId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatasetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
