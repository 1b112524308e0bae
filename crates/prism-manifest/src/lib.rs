//! Catalog manifest for Prism
//!
//! This crate turns a flat bucket listing into a versioned catalog of packs
//! and keeps the last built catalog in memory for a bounded time:
//! - `indexer`: crawl and group `<category>/<target>/<file>` keys
//! - `cache`: TTL cache with an injectable clock that keeps serving the
//!   previous catalog when a rebuild fails
//! - `query`: filtering, pagination and single-file lookup

pub mod indexer;
pub mod cache;
pub mod query;

// Re-export main types
pub use indexer::ManifestIndexer;
pub use cache::{ManifestCache, ManifestCacheStats};
pub use query::{filter_packs, find_file, paginate, ManifestPage, ManifestQuery, Page};

use prism_core::error::PrismError;

/// Result type for manifest operations
pub type ManifestResult<T> = Result<T, PrismError>;
