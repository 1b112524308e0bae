//! Blob store adapter for Prism
//!
//! This crate provides the narrow object-store surface the catalog and the
//! inference cache need: paginated listing, existence probes, uploads with
//! metadata and presigned downloads. Backends:
//! - `S3Store` for S3-compatible services such as Cloudflare R2
//! - `MemoryStore` for tests and local experiments
//! - `TimeoutStore` to bound every call of another backend

pub mod traits;
pub mod memory;
pub mod s3;
pub mod timeout;

// Re-export main types
pub use traits::{BlobStore, ListPage, Metadata};
pub use memory::{MemoryStore, MemoryStoreStats, StoredObject};
pub use s3::S3Store;
pub use timeout::TimeoutStore;

use prism_config::StoreSettings;
use prism_core::error::PrismError;
use std::sync::Arc;
use std::time::Duration;

/// Result type for store operations
pub type StoreResult<T> = Result<T, PrismError>;

/// Build the configured S3 store, bounded by the configured timeout.
///
/// Fails with a configuration error when the bucket, endpoint or
/// credentials are missing.
pub fn connect(settings: &StoreSettings) -> StoreResult<Arc<dyn BlobStore>> {
    let credentials = settings.validate()?;
    let store = S3Store::new(&credentials, settings);
    Ok(Arc::new(TimeoutStore::new(
        store,
        Duration::from_secs(settings.timeout_seconds),
    )))
}
