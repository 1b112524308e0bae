//! Image inference for Prism
//!
//! This crate provides HTTP client functionality for Hugging Face style
//! inference endpoints with retry logic, request validation, response
//! normalization and a service that routes every call through the
//! content-addressed cache.

pub mod operation;
pub mod client;
pub mod decode;
pub mod service;

// Re-export main types
pub use operation::{
    EditByTextRequest, Operation, QwenEditRequest, RemoveBackgroundRequest, RestoreRequest,
    RestoreTask,
};
pub use client::{HfClient, RetryConfig, Transform};
pub use decode::{decode_response, Decoded};
pub use service::{InferenceOutcome, InferenceService};

use prism_core::error::PrismError;

/// Result type for inference operations
pub type InferenceResult<T> = Result<T, PrismError>;
