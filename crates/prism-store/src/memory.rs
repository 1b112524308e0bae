//! In-memory blob store
//!
//! Behaves like a bucket for tests: ordered keys, paginated listings with
//! continuation tokens, and switches to simulate outages.

use async_trait::async_trait;
use parking_lot::RwLock;
use prism_core::error::PrismError;
use prism_core::types::ObjectRecord;
use prism_core::utils::sha256_hex;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::traits::{BlobStore, ListPage, Metadata};
use crate::StoreResult;

/// An object held by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub metadata: Metadata,
    pub etag: String,
}

/// Call counters, useful to assert that a cache did or did not hit the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub list_calls: u64,
    pub exists_calls: u64,
    pub put_calls: u64,
    pub presign_calls: u64,
}

#[derive(Debug, Default)]
struct Counters {
    list: AtomicU64,
    exists: AtomicU64,
    put: AtomicU64,
    presign: AtomicU64,
}

/// Blob store backed by a `BTreeMap`
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
    offline: AtomicBool,
    read_only: AtomicBool,
    counters: Counters,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            bucket: "memory".to_string(),
            objects: RwLock::new(BTreeMap::new()),
            page_size: 1000,
            offline: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Limit how many keys a single `list` call returns
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Insert an object directly, bypassing counters and failure switches
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let object = StoredObject {
            etag: sha256_hex(&data)[..32].to_string(),
            data,
            content_type: prism_core::DEFAULT_CONTENT_TYPE.to_string(),
            metadata: Metadata::new(),
        };
        self.objects.write().insert(key.into(), object);
    }

    pub fn remove(&self, key: &str) -> Option<StoredObject> {
        self.objects.write().remove(key)
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Make every call fail as if the store were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make uploads fail while reads keep working
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            list_calls: self.counters.list.load(Ordering::Relaxed),
            exists_calls: self.counters.exists.load(Ordering::Relaxed),
            put_calls: self.counters.put.load(Ordering::Relaxed),
            presign_calls: self.counters.presign.load(Ordering::Relaxed),
        }
    }

    fn check_online(&self, operation: &str) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PrismError::StoreUnavailable {
                message: format!("{} failed: store offline", operation),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn list(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage> {
        self.counters.list.fetch_add(1, Ordering::Relaxed);
        self.check_online("list")?;

        let objects = self.objects.read();
        let lower = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut records = Vec::new();
        let mut next_token = None;
        for (key, object) in objects.range((lower, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }
            if records.len() == self.page_size {
                next_token = records.last().map(|record: &ObjectRecord| record.key.clone());
                break;
            }
            let mut record = ObjectRecord::new(key.clone(), object.data.len() as u64)
                .with_etag(Some(&object.etag));
            record.content_type = object.content_type.clone();
            records.push(record);
        }

        Ok(ListPage { records, next_token })
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.counters.exists.fetch_add(1, Ordering::Relaxed);
        self.check_online("head")?;
        Ok(self.objects.read().contains_key(key))
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &Metadata,
    ) -> StoreResult<()> {
        self.counters.put.fetch_add(1, Ordering::Relaxed);
        self.check_online("put")?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(PrismError::StoreUnavailable {
                message: format!("put {} rejected: store is read-only", key),
                source: None,
            });
        }

        let object = StoredObject {
            data: data.to_vec(),
            content_type: content_type.to_string(),
            metadata: metadata.clone(),
            etag: sha256_hex(data)[..32].to_string(),
        };
        self.objects.write().insert(key.to_string(), object);
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        self.counters.presign.fetch_add(1, Ordering::Relaxed);
        self.check_online("presign")?;
        Ok(format!(
            "memory://{}/{}?expires={}",
            self.bucket,
            key,
            ttl.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_paginates_in_key_order() {
        let store = MemoryStore::new().with_page_size(2);
        for key in ["A/x/3.cube", "A/x/1.cube", "A/x/2.cube", "B/y/1.xmp"] {
            store.insert(key, b"data".to_vec());
        }

        let first = store.list("A/", None).await.unwrap();
        let keys: Vec<_> = first.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A/x/1.cube", "A/x/2.cube"]);
        assert_eq!(first.next_token.as_deref(), Some("A/x/2.cube"));

        let second = store.list("A/", first.next_token.as_deref()).await.unwrap();
        let keys: Vec<_> = second.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A/x/3.cube"]);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_exact_page_has_no_token() {
        let store = MemoryStore::new().with_page_size(2);
        store.insert("a", b"1".to_vec());
        store.insert("b", b"2".to_vec());

        let page = store.list("", None).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_put_then_exists() {
        let store = MemoryStore::new();
        assert!(!store.exists("k").await.unwrap());

        let mut metadata = Metadata::new();
        metadata.insert("model".to_string(), "m".to_string());
        store.put("k", b"png", "image/png", &metadata).await.unwrap();

        assert!(store.exists("k").await.unwrap());
        let object = store.get("k").unwrap();
        assert_eq!(object.content_type, "image/png");
        assert_eq!(object.metadata.get("model").map(String::as_str), Some("m"));
        assert_eq!(store.stats().put_calls, 1);
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let store = MemoryStore::new();
        store.insert("k", b"1".to_vec());
        store.set_offline(true);

        let err = store.exists("k").await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.list("", None).await.is_err());
        assert!(store.presign("k", Duration::from_secs(60)).await.is_err());

        store.set_offline(false);
        assert!(store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_only_rejects_put() {
        let store = MemoryStore::new();
        store.set_read_only(true);
        let result = store.put("k", b"1", "image/png", &Metadata::new()).await;
        assert!(result.is_err());
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_presign_mentions_ttl() {
        let store = MemoryStore::new();
        let url = store.presign("a/b.png", Duration::from_secs(900)).await.unwrap();
        assert_eq!(url, "memory://memory/a/b.png?expires=900");
    }
}
