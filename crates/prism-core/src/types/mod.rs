//! Catalog data types.
//!
//! This module provides the types the manifest indexer produces:
//! - Object records as returned by the blob store
//! - Packs grouping records by `category/target`
//! - The versioned manifest of packs

pub mod object;
pub mod pack;

// Re-export all public types
pub use object::{ObjectRecord, DEFAULT_CONTENT_TYPE};
pub use pack::{Manifest, Pack};
