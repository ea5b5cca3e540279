//! Error types for the lake storage crate

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Storage configuration missing or invalid
    E001InvalidConfig,
    /// E002: Object write failed
    E002WriteFailure,
    /// E003: Object listing or read failed
    E003ReadFailure,
    /// E004: Parquet encoding or decoding failed
    E004EncodeFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidConfig => "E001",
            Self::E002WriteFailure => "E002",
            Self::E003ReadFailure => "E003",
            Self::E004EncodeFailure => "E004",
        }
    }

    pub fn docs_url(&self) -> String {
        format!(
            "https://gharchive-lake.github.io/gharchive-lake/troubleshooting.html#{}",
            self.as_str().to_lowercase()
        )
    }
}

/// Errors that can occur while reading or writing lake objects
#[derive(Debug, Error)]
pub enum StorageError {
    /// Invalid storage configuration provided
    #[error("[{code}] Invalid storage configuration: {message}\n\nSee: {docs_url}")]
    InvalidConfig {
        code: &'static str,
        message: String,
        docs_url: String,
    },

    /// Writing an object failed; the partial upload was aborted
    #[error("[{code}] Write to '{path}' failed: {reason}\n\nTroubleshooting:\n  • Verify the bucket exists and is writable\n  • Check storage credentials\n\nSee: {docs_url}")]
    WriteFailure {
        code: &'static str,
        path: String,
        reason: String,
        docs_url: String,
    },

    /// Listing or reading objects failed
    #[error("[{code}] Read from '{path}' failed: {reason}\n\nSee: {docs_url}")]
    ReadFailure {
        code: &'static str,
        path: String,
        reason: String,
        docs_url: String,
    },

    /// Parquet encoding or decoding failed
    #[error("[{code}] Parquet encoding failed for '{path}': {reason}\n\nSee: {docs_url}")]
    EncodeFailure {
        code: &'static str,
        path: String,
        reason: String,
        docs_url: String,
    },
}

impl StorageError {
    /// Create an invalid config error with error code
    pub fn invalid_config(message: impl Into<String>) -> Self {
        let code_enum = ErrorCode::E001InvalidConfig;
        Self::InvalidConfig {
            code: code_enum.as_str(),
            message: message.into(),
            docs_url: code_enum.docs_url(),
        }
    }

    /// Create a write failure error with error code
    pub fn write_failure(path: impl Into<String>, reason: impl ToString) -> Self {
        let code_enum = ErrorCode::E002WriteFailure;
        Self::WriteFailure {
            code: code_enum.as_str(),
            path: path.into(),
            reason: reason.to_string(),
            docs_url: code_enum.docs_url(),
        }
    }

    /// Create a read failure error with error code
    pub fn read_failure(path: impl Into<String>, reason: impl ToString) -> Self {
        let code_enum = ErrorCode::E003ReadFailure;
        Self::ReadFailure {
            code: code_enum.as_str(),
            path: path.into(),
            reason: reason.to_string(),
            docs_url: code_enum.docs_url(),
        }
    }

    /// Create an encode failure error with error code
    pub fn encode_failure(path: impl Into<String>, reason: impl ToString) -> Self {
        let code_enum = ErrorCode::E004EncodeFailure;
        Self::EncodeFailure {
            code: code_enum.as_str(),
            path: path.into(),
            reason: reason.to_string(),
            docs_url: code_enum.docs_url(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { code, .. }
            | Self::WriteFailure { code, .. }
            | Self::ReadFailure { code, .. }
            | Self::EncodeFailure { code, .. } => code,
        }
    }
}

/// Result type alias for StorageError
pub type Result<T> = std::result::Result<T, StorageError>;
