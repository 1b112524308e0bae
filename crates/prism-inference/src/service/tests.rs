use super::*;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use prism_cache::{CacheKeyDeriver, Produced};
use prism_core::clock::ManualClock;
use prism_core::error::{ErrorClass, PrismError};
use prism_store::MemoryStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::operation::{EditByTextRequest, RemoveBackgroundRequest};

#[derive(Default)]
struct CountingTransform {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Transform for CountingTransform {
    async fn transform(&self, operation: &Operation) -> InferenceResult<Produced> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PrismError::Upstream {
                status: Some(500),
                message: "backend exploded".to_string(),
            });
        }
        Ok(Produced::new(b"result".to_vec(), "image/png")
            .with_metadata("model", operation.model())
            .with_metadata("seed", "42"))
    }
}

fn service(store: Arc<MemoryStore>, transform: Arc<CountingTransform>) -> InferenceService {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 10, 5, 9, 0, 0).unwrap(),
    ));
    let deriver = CacheKeyDeriver::new("inference", "png", clock);
    let cache = ContentCache::new(store, deriver, Duration::from_secs(900));
    InferenceService::new(Arc::new(cache), transform)
}

fn edit() -> Operation {
    Operation::EditByText(EditByTextRequest::new(b"img".to_vec(), "add fog"))
}

#[tokio::test]
async fn test_second_run_is_a_hit() {
    let store = Arc::new(MemoryStore::new());
    let transform = Arc::new(CountingTransform::default());
    let service = service(store.clone(), transform.clone());

    let first = service.run(edit(), None).await.unwrap();
    assert!(!first.hit);
    assert_eq!(first.meta["seed"], "42");
    assert_eq!(first.meta["cache_hit"], false);
    assert_eq!(first.meta["cache_key"], first.key.path.as_str());
    assert!(first
        .key
        .path
        .starts_with("inference/edit_by_text/2025/10/05/default/"));

    let second = service.run(edit(), None).await.unwrap();
    assert!(second.hit);
    assert_eq!(second.key, first.key);
    assert_eq!(second.meta["cache_hit"], true);
    assert_eq!(second.meta["model"], "timbrooks/instruct-pix2pix");

    assert_eq!(transform.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_variant_changes_key_path() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store, Arc::new(CountingTransform::default()));

    let outcome = service.run(edit(), Some("mobile")).await.unwrap();
    assert!(outcome.key.path.contains("/mobile/"));
}

#[tokio::test]
async fn test_invalid_operation_touches_nothing() {
    let store = Arc::new(MemoryStore::new());
    let transform = Arc::new(CountingTransform::default());
    let service = service(store.clone(), transform.clone());

    let op = Operation::RemoveBackground(RemoveBackgroundRequest { image: Vec::new() });
    let err = service.run(op, None).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::InvalidRequest);
    assert_eq!(store.stats().exists_calls, 0);
    assert_eq!(transform.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_backend_failure_is_not_cached() {
    let store = Arc::new(MemoryStore::new());
    let transform = Arc::new(CountingTransform {
        fail: true,
        ..Default::default()
    });
    let service = service(store.clone(), transform.clone());

    let err = service.run(edit(), None).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Upstream);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_inline_outcome_json() {
    let store = Arc::new(MemoryStore::new());
    store.set_read_only(true);
    let service = service(store, Arc::new(CountingTransform::default()));

    let outcome = service.run(edit(), None).await.unwrap();
    assert!(outcome.artifact.is_inline());

    let body = outcome.to_json();
    assert_eq!(body["image"], "cmVzdWx0");
    assert_eq!(body["content_type"], "image/png");
    assert_eq!(body["meta"]["cache_hit"], false);
    assert!(body.get("url").is_none());
}

#[tokio::test]
async fn test_stored_outcome_json() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store, Arc::new(CountingTransform::default()));

    let body = service.run(edit(), None).await.unwrap().to_json();
    assert!(body["url"].as_str().unwrap().starts_with("memory://"));
}
