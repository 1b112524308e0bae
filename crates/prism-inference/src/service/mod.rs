//! Cached inference service
//!
//! Every operation is validated, keyed and resolved through the shared
//! [`ContentCache`], so identical requests hit the backend at most once.

use base64::{engine::general_purpose, Engine as _};
use prism_cache::{Artifact, CacheKey, ContentCache};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::client::Transform;
use crate::operation::Operation;
use crate::InferenceResult;

/// What a caller gets back from [`InferenceService::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutcome {
    pub operation: &'static str,
    pub key: CacheKey,
    pub hit: bool,
    pub artifact: Artifact,
    /// Backend metadata plus `cache_key`, `cache_hit` and `model`
    pub meta: Map<String, Value>,
}

impl InferenceOutcome {
    /// Response body shape: `url` when stored, base64 `image` when inline
    pub fn to_json(&self) -> Value {
        let mut body = match &self.artifact {
            Artifact::Stored { url } => json!({ "url": url }),
            Artifact::Inline {
                bytes,
                content_type,
            } => json!({
                "image": general_purpose::STANDARD.encode(bytes),
                "content_type": content_type,
            }),
        };
        body["meta"] = Value::Object(self.meta.clone());
        body
    }
}

/// Routes operations through the content cache to a [`Transform`]
pub struct InferenceService {
    cache: Arc<ContentCache>,
    transform: Arc<dyn Transform>,
}

impl InferenceService {
    pub fn new(cache: Arc<ContentCache>, transform: Arc<dyn Transform>) -> Self {
        Self { cache, transform }
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Run `operation`, reusing a stored artifact when one exists.
    ///
    /// Validation happens first so a malformed request never probes the
    /// store or reaches the backend.
    pub async fn run(
        &self,
        operation: Operation,
        variant: Option<&str>,
    ) -> InferenceResult<InferenceOutcome> {
        operation.validate()?;

        let request = operation.key_request(variant);
        let transform = Arc::clone(&self.transform);
        let resolution = self
            .cache
            .resolve(&request, || async { transform.transform(&operation).await })
            .await?;

        let mut meta: Map<String, Value> = resolution
            .metadata
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        meta.entry("model")
            .or_insert_with(|| Value::String(operation.model().to_string()));
        meta.insert("cache_key".to_string(), Value::String(resolution.key.path.clone()));
        meta.insert("cache_hit".to_string(), Value::Bool(resolution.hit));

        info!(
            operation = operation.name(),
            key = %resolution.key,
            hit = resolution.hit,
            inline = resolution.artifact.is_inline(),
            "Inference resolved"
        );

        Ok(InferenceOutcome {
            operation: operation.name(),
            key: resolution.key,
            hit: resolution.hit,
            artifact: resolution.artifact,
            meta,
        })
    }
}

#[cfg(test)]
mod tests;
