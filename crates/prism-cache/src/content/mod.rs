//! Compute-once artifact cache over a blob store
//!
//! [`ContentCache::resolve`] probes the derived key, answers hits with a
//! presigned URL and otherwise runs the producer, uploads its output and
//! presigns that. Resolutions of the same key inside one process are
//! serialized so concurrent callers share a single computation.

use dashmap::DashMap;
use prism_core::error::PrismError;
use prism_store::{BlobStore, Metadata};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::key::{CacheKey, CacheKeyDeriver, KeyRequest};
use crate::CacheResult;

/// Output of a successful producer run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Stored alongside the artifact (model name and the like)
    pub metadata: Metadata,
}

impl Produced {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }
}

/// Where the caller can get the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Durably stored, reachable through a presigned URL
    Stored { url: String },
    /// Computed but not stored; the bytes travel with the response
    Inline { bytes: Vec<u8>, content_type: String },
}

impl Artifact {
    pub fn url(&self) -> Option<&str> {
        match self {
            Artifact::Stored { url } => Some(url),
            Artifact::Inline { .. } => None,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Artifact::Inline { .. })
    }
}

/// Result of [`ContentCache::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub key: CacheKey,
    pub hit: bool,
    pub artifact: Artifact,
    /// Metadata produced on a miss; empty on a hit
    pub metadata: Metadata,
}

/// Counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inline_fallbacks: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inline_fallbacks: AtomicU64,
}

/// Content-addressed cache in front of an expensive producer
pub struct ContentCache {
    store: Arc<dyn BlobStore>,
    deriver: CacheKeyDeriver,
    presign_ttl: Duration,
    producer_timeout: Option<Duration>,
    /// Per-key locks for in-process single-flight
    locks: DashMap<String, Arc<Mutex<()>>>,
    counters: Counters,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("deriver", &self.deriver)
            .field("presign_ttl", &self.presign_ttl)
            .field("producer_timeout", &self.producer_timeout)
            .field("in_flight", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl ContentCache {
    pub fn new(store: Arc<dyn BlobStore>, deriver: CacheKeyDeriver, presign_ttl: Duration) -> Self {
        Self {
            store,
            deriver,
            presign_ttl,
            producer_timeout: None,
            locks: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Bound every producer run
    pub fn with_producer_timeout(mut self, limit: Duration) -> Self {
        self.producer_timeout = Some(limit);
        self
    }

    pub fn producer_timeout(&self) -> Option<Duration> {
        self.producer_timeout
    }

    pub fn deriver(&self) -> &CacheKeyDeriver {
        &self.deriver
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            inline_fallbacks: self.counters.inline_fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Return the cached artifact for `request`, computing it with
    /// `producer` on a miss.
    ///
    /// A store that cannot answer the existence probe is an error, never a
    /// miss, and the producer is not invoked. A producer error is returned
    /// unchanged and nothing is written. An invalid request is rejected
    /// before the store is probed.
    pub async fn resolve<F, Fut>(&self, request: &KeyRequest, producer: F) -> CacheResult<Resolution>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<Produced>>,
    {
        request.validate()?;
        let key = self.deriver.derive(request);
        let lock = self
            .locks
            .entry(key.path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.resolve_locked(request, key.clone(), producer).await
        };

        drop(lock);
        self.locks
            .remove_if(&key.path, |_, entry| Arc::strong_count(entry) == 1);

        result
    }

    async fn resolve_locked<F, Fut>(
        &self,
        request: &KeyRequest,
        key: CacheKey,
        producer: F,
    ) -> CacheResult<Resolution>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<Produced>>,
    {
        if self.store.exists(&key.path).await? {
            let url = self.store.presign(&key.path, self.presign_ttl).await?;
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            info!(key = %key, operation = request.operation(), "Cache hit");
            return Ok(Resolution {
                key,
                hit: true,
                artifact: Artifact::Stored { url },
                metadata: Metadata::new(),
            });
        }

        debug!(key = %key, "Cache miss, running producer");
        let produced = self.run_producer(request.operation(), producer).await?;
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let mut stored_metadata = produced.metadata.clone();
        stored_metadata.insert("operation".to_string(), request.operation().to_string());
        stored_metadata.insert(
            "params".to_string(),
            serde_json::to_string(request.params()).unwrap_or_default(),
        );

        if let Err(err) = self
            .store
            .put(&key.path, &produced.bytes, &produced.content_type, &stored_metadata)
            .await
        {
            warn!(key = %key, error = %err, "Caching failed, returning result inline");
            return Ok(self.inline(key, produced));
        }
        info!(key = %key, size = produced.bytes.len(), "Stored artifact");

        match self.store.presign(&key.path, self.presign_ttl).await {
            Ok(url) => Ok(Resolution {
                key,
                hit: false,
                artifact: Artifact::Stored { url },
                metadata: produced.metadata,
            }),
            Err(err) => {
                warn!(key = %key, error = %err, "Presign failed, returning result inline");
                Ok(self.inline(key, produced))
            }
        }
    }

    async fn run_producer<F, Fut>(&self, operation: &str, producer: F) -> CacheResult<Produced>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<Produced>>,
    {
        match self.producer_timeout {
            Some(limit) => tokio::time::timeout(limit, producer())
                .await
                .map_err(|_| PrismError::Timeout {
                    operation: operation.to_string(),
                    seconds: limit.as_secs(),
                })?,
            None => producer().await,
        }
    }

    fn inline(&self, key: CacheKey, produced: Produced) -> Resolution {
        self.counters.inline_fallbacks.fetch_add(1, Ordering::Relaxed);
        Resolution {
            key,
            hit: false,
            artifact: Artifact::Inline {
                bytes: produced.bytes,
                content_type: produced.content_type,
            },
            metadata: produced.metadata,
        }
    }
}
