//! Per-call deadline for another store

use async_trait::async_trait;
use prism_core::error::PrismError;
use std::future::Future;
use std::time::Duration;

use crate::traits::{BlobStore, ListPage, Metadata};
use crate::StoreResult;

/// Wraps a store so no call can hang longer than `limit`
#[derive(Debug, Clone)]
pub struct TimeoutStore<S> {
    inner: S,
    limit: Duration,
}

impl<S: BlobStore> TimeoutStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, limit_ms = self.limit.as_millis() as u64, "Store call timed out");
                Err(PrismError::Timeout {
                    operation: format!("store {}", operation),
                    seconds: self.limit.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl<S: BlobStore> BlobStore for TimeoutStore<S> {
    async fn list(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage> {
        self.bounded("list", self.inner.list(prefix, continuation)).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.bounded("head", self.inner.exists(key)).await
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &Metadata,
    ) -> StoreResult<()> {
        self.bounded("put", self.inner.put(key, data, content_type, metadata))
            .await
    }

    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        self.bounded("presign", self.inner.presign(key, ttl)).await
    }
}
