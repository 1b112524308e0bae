//! The blob store abstraction

use async_trait::async_trait;
use prism_core::types::ObjectRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::StoreResult;

/// User metadata attached to an uploaded object
pub type Metadata = BTreeMap<String, String>;

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub records: Vec<ObjectRecord>,
    /// Present when more keys remain under the prefix
    pub next_token: Option<String>,
}

/// Minimal object store surface.
///
/// Implementations must distinguish a confirmed absence (`Ok(false)` from
/// [`BlobStore::exists`]) from a failure to find out (`Err`).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List one page of keys under `prefix`
    async fn list(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage>;

    /// Check whether `key` exists
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Upload `data`, replacing any object already at `key`
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &Metadata,
    ) -> StoreResult<()>;

    /// Produce a time-limited download URL for `key`
    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn list(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage> {
        (**self).list(prefix, continuation).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        (**self).exists(key).await
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &Metadata,
    ) -> StoreResult<()> {
        (**self).put(key, data, content_type, metadata).await
    }

    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        (**self).presign(key, ttl).await
    }
}
