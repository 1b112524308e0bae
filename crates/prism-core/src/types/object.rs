//! Object records as listed from the blob store.

use serde::{Deserialize, Serialize};

/// Content type assumed for catalog objects
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A single stored object, as seen by a listing snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Slash-delimited object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Weak checksum reported by the store, quotes stripped
    #[serde(default)]
    pub etag: Option<String>,
    /// MIME type
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl ObjectRecord {
    /// Create a record with no etag and the generic content type
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            etag: None,
            content_type: default_content_type(),
        }
    }

    /// Attach an etag, normalizing away the quotes S3 wraps it in
    pub fn with_etag(mut self, etag: Option<&str>) -> Self {
        self.etag = etag
            .map(|tag| tag.trim_matches('"'))
            .filter(|tag| !tag.is_empty())
            .map(str::to_string);
        self
    }

    /// True for zero-byte "directory" placeholders
    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}
