//! Deterministic cache keys
//!
//! A key is derived from everything that influences an inference result:
//! the operation, the input bytes, an optional style variant and the
//! parameters. The canonical form is a compact JSON object with sorted keys
//! whose SHA-256 digest (first 16 hex chars) names the artifact.

use chrono::{DateTime, Utc};
use prism_config::CacheSettings;
use prism_core::clock::{Clock, SystemClock};
use prism_core::error::PrismError;
use prism_core::utils::{sha256_hex, sha256_hex_parts};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::CacheResult;

/// Hex characters of the digest kept in the key
pub const DIGEST_LEN: usize = 16;

/// Request parameters, kept sorted so insertion order never matters
pub type Params = BTreeMap<String, Value>;

/// Everything that identifies one inference result
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRequest {
    operation: String,
    source_digest: String,
    variant: Option<String>,
    params: Params,
}

impl KeyRequest {
    /// A request over a single input
    pub fn new(operation: impl Into<String>, input: &[u8]) -> Self {
        Self {
            operation: operation.into(),
            source_digest: sha256_hex(input),
            variant: None,
            params: Params::new(),
        }
    }

    /// A request over several inputs, digested as one concatenated sequence.
    ///
    /// The order of `inputs` is part of the key.
    pub fn with_inputs<B: AsRef<[u8]>>(operation: impl Into<String>, inputs: &[B]) -> Self {
        Self {
            operation: operation.into(),
            source_digest: sha256_hex_parts(inputs),
            variant: None,
            params: Params::new(),
        }
    }

    pub fn variant(mut self, variant: Option<impl Into<String>>) -> Self {
        self.variant = variant.map(Into::into).filter(|v: &String| !v.is_empty());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn source_digest(&self) -> &str {
        &self.source_digest
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Operation and variant each become exactly one path segment
    pub fn validate(&self) -> CacheResult<()> {
        path_segment("operation", &self.operation)?;
        if let Some(variant) = &self.variant {
            path_segment("variant", variant)?;
        }
        Ok(())
    }

    /// Compact JSON with sorted keys
    pub fn canonical(&self) -> String {
        json!({
            "params": self.params,
            "src": self.source_digest,
            "style": self.variant,
            "task": self.operation,
        })
        .to_string()
    }
}

fn path_segment(field: &str, value: &str) -> CacheResult<()> {
    if value.trim().is_empty() {
        return Err(PrismError::invalid(field, "cannot be empty"));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(PrismError::invalid(
            field,
            format!("'{}' must be a single path segment", value),
        ));
    }
    Ok(())
}

/// A derived artifact key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Full object key, e.g. `inference/restore/2025/10/19/default/0123456789abcdef.png`
    pub path: String,
    /// 16 hex characters of the canonical digest
    pub digest: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Turns [`KeyRequest`]s into browsable, date-partitioned keys
#[derive(Debug, Clone)]
pub struct CacheKeyDeriver {
    namespace: String,
    extension: String,
    clock: Arc<dyn Clock>,
}

impl CacheKeyDeriver {
    pub fn new(
        namespace: impl Into<String>,
        extension: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            namespace: namespace.into().trim_matches('/').to_string(),
            extension: extension.into().trim_start_matches('.').to_string(),
            clock,
        }
    }

    pub fn from_settings(settings: &CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self::new(&settings.namespace, &settings.extension, clock)
    }

    /// Digest of the canonical request form
    pub fn digest(request: &KeyRequest) -> String {
        let mut digest = sha256_hex(request.canonical().as_bytes());
        digest.truncate(DIGEST_LEN);
        digest
    }

    pub fn derive(&self, request: &KeyRequest) -> CacheKey {
        self.derive_at(request, self.clock.now())
    }

    /// Derive the key as it would be on a given date
    pub fn derive_at(&self, request: &KeyRequest, at: DateTime<Utc>) -> CacheKey {
        let digest = Self::digest(request);
        let path = format!(
            "{}/{}/{}/{}/{}.{}",
            self.namespace,
            request.operation,
            at.format("%Y/%m/%d"),
            request.variant.as_deref().unwrap_or("default"),
            digest,
            self.extension
        );
        CacheKey { path, digest }
    }
}

impl Default for CacheKeyDeriver {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default(), Arc::new(SystemClock))
    }
}
