//! Configuration parsing for Prism
//!
//! This crate handles parsing and validation of prism.toml and the
//! environment variables a deployment already sets, providing one typed
//! settings tree for the store, manifest, cache and inference crates.

pub mod toml;
pub mod merge;

// Re-export main types
pub use toml::{
    CacheSettings, EndpointSettings, InferenceSettings, ManifestSettings, PrismToml,
    StoreCredentials, StoreSettings,
};
pub use merge::{ConfigLayering, ConfigLoader, ConfigSource};

use prism_core::error::PrismError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, PrismError>;
