//! Content-addressed inference cache for Prism
//!
//! This crate maps an inference request to a deterministic object key and
//! makes sure each distinct request is computed at most once per key:
//! later requests for the same inputs are answered with a presigned URL to
//! the stored artifact.

pub mod key;
pub mod content;

// Re-export main types
pub use key::{CacheKey, CacheKeyDeriver, KeyRequest, Params};
pub use content::{Artifact, CacheStats, ContentCache, Produced, Resolution};

use prism_core::error::PrismError;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, PrismError>;
