//! Error types and result aliases for Prism operations.
//!
//! Provides a unified error type that covers every failure across the
//! catalog and inference paths, plus a coarse classification used to decide
//! what a caller is shown and whether a retry makes sense.

use thiserror::Error;

/// Unified error type for all Prism operations
#[derive(Error, Debug)]
pub enum PrismError {
    // Config errors
    #[error("Failed to parse {file}: {message} at line {line}, column {column}")]
    TomlParse {
        file: String,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // Store errors
    #[error("Object store unavailable: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    // Producer errors
    #[error("Upstream computation failed: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    // Client errors
    #[error("Invalid request: '{field}' {reason}")]
    InvalidRequest { field: String, reason: String },

    #[error("Pack '{id}' not found")]
    PackNotFound { id: String },

    #[error("File '{key}' not found in pack '{pack}'")]
    FileNotFound { pack: String, key: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Prism operations
pub type PrismResult<T> = Result<T, PrismError>;

/// Coarse classification of a [`PrismError`], mirroring how a front end
/// reports it: bad input, missing resource, temporary outage, failed
/// upstream computation, or broken deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvalidRequest,
    NotFound,
    Unavailable,
    Upstream,
    Configuration,
}

impl PrismError {
    /// Create a store error from any error type
    pub fn store<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StoreUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a request validation error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            PrismError::TomlParse { .. } | PrismError::ConfigValidation { .. } => {
                ErrorClass::Configuration
            }
            PrismError::StoreUnavailable { .. }
            | PrismError::Timeout { .. }
            | PrismError::Io { .. } => ErrorClass::Unavailable,
            PrismError::Upstream { .. } => ErrorClass::Upstream,
            PrismError::InvalidRequest { .. } => ErrorClass::InvalidRequest,
            PrismError::PackNotFound { .. } | PrismError::FileNotFound { .. } => {
                ErrorClass::NotFound
            }
        }
    }

    /// Check if retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Unavailable
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            PrismError::ConfigValidation { .. } => {
                Some("Check prism.toml or the CF_R2_* / HF_* environment variables")
            }
            PrismError::StoreUnavailable { .. } => {
                Some("The object store could not be reached; try again shortly")
            }
            PrismError::Timeout { .. } => Some("Raise the timeout or try again later"),
            PrismError::Upstream { .. } => {
                Some("The inference backend failed; check the endpoint status")
            }
            PrismError::PackNotFound { .. } => {
                Some("Run 'prism manifest' to list available packs")
            }
            PrismError::FileNotFound { .. } => {
                Some("Run 'prism manifest --json' to see the files of each pack")
            }
            _ => None,
        }
    }
}
