//! # prism-core
//!
//! Core types and utilities shared across all Prism crates.
//!
//! This crate provides:
//! - Catalog types (`ObjectRecord`, `Pack`, `Manifest`) with serde support
//! - `PrismError` for unified error handling and its `ErrorClass`
//! - An injectable `Clock` so time-dependent code can be tested deterministically
//! - Hashing helpers
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Catalog data types
//! - `error`: Error types and result aliases
//! - `clock`: Wall-clock abstraction
//! - `utils`: Utility functions and helpers

pub mod clock;
pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorClass, PrismError, PrismResult};
pub use types::{Manifest, ObjectRecord, Pack, DEFAULT_CONTENT_TYPE};
