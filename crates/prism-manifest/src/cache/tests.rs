//! Unit tests for the manifest cache

use super::*;
use async_trait::async_trait;
use chrono::TimeZone;
use prism_config::ManifestSettings;
use prism_core::clock::ManualClock;
use prism_store::{BlobStore, ListPage, MemoryStore, Metadata, StoreResult};

const TTL: Duration = Duration::from_secs(300);

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 19, 9, 0, 0).unwrap()
}

fn cache_over(store: Arc<dyn BlobStore>, clock: Arc<ManualClock>) -> ManifestCache {
    let indexer = ManifestIndexer::new(store, &ManifestSettings::default());
    ManifestCache::new(indexer, TTL, clock)
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert("Cat1/T1/a.xmp", vec![1]);
    store
}

#[tokio::test]
async fn test_first_get_builds() {
    let store = seeded_store();
    let cache = cache_over(store.clone(), Arc::new(ManualClock::new(start())));

    assert!(cache.peek().is_none());
    let manifest = cache.get().await.unwrap();

    assert_eq!(manifest.packs().len(), 1);
    assert_eq!(cache.built_at(), Some(start()));
    assert_eq!(cache.stats().builds, 1);
}

#[tokio::test]
async fn test_fresh_manifest_skips_store() {
    let store = seeded_store();
    let clock = Arc::new(ManualClock::new(start()));
    let cache = cache_over(store.clone(), clock.clone());

    let first = cache.get().await.unwrap();
    clock.advance(chrono::Duration::seconds(300));
    let second = cache.get().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.stats().list_calls, 1);
    assert_eq!(cache.stats().hits, 1);
}

#[tokio::test]
async fn test_expired_manifest_is_rebuilt() {
    let store = seeded_store();
    let clock = Arc::new(ManualClock::new(start()));
    let cache = cache_over(store.clone(), clock.clone());

    cache.get().await.unwrap();
    store.insert("Cat2/T2/b.cube", vec![2]);
    clock.advance(chrono::Duration::seconds(301));

    let rebuilt = cache.get().await.unwrap();
    assert_eq!(rebuilt.packs().len(), 2);
    assert_eq!(store.stats().list_calls, 2);
    assert_eq!(cache.built_at(), Some(start() + chrono::Duration::seconds(301)));
}

#[tokio::test]
async fn test_failed_rebuild_serves_previous_manifest() {
    let store = seeded_store();
    let clock = Arc::new(ManualClock::new(start()));
    let cache = cache_over(store.clone(), clock.clone());

    let original = cache.get().await.unwrap();
    clock.advance(chrono::Duration::seconds(600));
    store.set_offline(true);

    let served = cache.get().await.unwrap();
    assert!(Arc::ptr_eq(&original, &served));

    let stats = cache.stats();
    assert_eq!(stats.failed_builds, 1);
    assert_eq!(stats.stale_served, 1);
}

#[tokio::test]
async fn test_failed_first_build_is_an_error() {
    let store = seeded_store();
    store.set_offline(true);
    let cache = cache_over(store, Arc::new(ManualClock::new(start())));

    let err = cache.get().await.unwrap_err();
    assert!(err.is_transient());
    assert!(cache.peek().is_none());
}

#[tokio::test]
async fn test_backwards_clock_counts_as_stale() {
    let store = seeded_store();
    let clock = Arc::new(ManualClock::new(start()));
    let cache = cache_over(store.clone(), clock.clone());

    cache.get().await.unwrap();
    clock.set(start() - chrono::Duration::seconds(5));
    cache.get().await.unwrap();

    assert_eq!(store.stats().list_calls, 2);
}

#[tokio::test]
async fn test_invalidate_forces_rebuild() {
    let store = seeded_store();
    let cache = cache_over(store.clone(), Arc::new(ManualClock::new(start())));

    cache.get().await.unwrap();
    cache.invalidate();
    assert!(cache.peek().is_some());

    cache.get().await.unwrap();
    assert_eq!(cache.stats().builds, 2);
}

/// Store whose listings take a while
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl BlobStore for SlowStore {
    async fn list(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage> {
        tokio::time::sleep(self.delay).await;
        self.inner.list(prefix, continuation).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key).await
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str, metadata: &Metadata) -> StoreResult<()> {
        self.inner.put(key, data, content_type, metadata).await
    }

    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        self.inner.presign(key, ttl).await
    }
}

#[tokio::test]
async fn test_expired_manifest_served_during_rebuild() {
    let slow = Arc::new(SlowStore {
        inner: MemoryStore::new(),
        delay: Duration::from_millis(100),
    });
    slow.inner.insert("Cat1/T1/a.xmp", vec![1]);
    let clock = Arc::new(ManualClock::new(start()));
    let cache = cache_over(slow.clone(), clock.clone());

    let original = cache.get().await.unwrap();
    slow.inner.insert("Cat2/T2/b.cube", vec![2]);
    clock.advance(chrono::Duration::seconds(301));

    let (rebuilt, during) = tokio::join!(cache.get(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.get().await
    });

    assert_eq!(rebuilt.unwrap().packs().len(), 2);
    assert!(Arc::ptr_eq(&during.unwrap(), &original));
    assert_eq!(slow.inner.stats().list_calls, 2);
}

#[tokio::test]
async fn test_cold_callers_share_one_build() {
    let slow = Arc::new(SlowStore {
        inner: MemoryStore::new(),
        delay: Duration::from_millis(50),
    });
    slow.inner.insert("Cat1/T1/a.xmp", vec![1]);
    let cache = cache_over(slow.clone(), Arc::new(ManualClock::new(start())));

    let (a, b) = tokio::join!(cache.get(), cache.get());

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(slow.inner.stats().list_calls, 1);
}
