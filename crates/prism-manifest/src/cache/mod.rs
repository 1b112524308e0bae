//! Manifest caching with TTL support

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use prism_core::clock::Clock;
use prism_core::types::Manifest;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::indexer::ManifestIndexer;
use crate::ManifestResult;

/// A built manifest together with the time it was built
#[derive(Debug)]
struct Snapshot {
    manifest: Arc<Manifest>,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    /// Clock going backwards counts as stale
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (now - self.built_at).to_std() {
            Ok(age) => age <= ttl,
            Err(_) => false,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestCacheStats {
    /// Calls answered from a fresh snapshot
    pub hits: u64,
    /// Successful rebuilds
    pub builds: u64,
    /// Rebuilds that failed
    pub failed_builds: u64,
    /// Calls answered with an expired snapshot
    pub stale_served: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    builds: AtomicU64,
    failed_builds: AtomicU64,
    stale_served: AtomicU64,
}

/// In-memory manifest cache with TTL.
///
/// The `(manifest, built_at)` pair is replaced as one `Arc`, so readers see
/// either the old or the new snapshot, never a mix. There is no background
/// refresh; an expired snapshot is rebuilt by the first caller to notice.
#[derive(Debug)]
pub struct ManifestCache {
    indexer: ManifestIndexer,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Held for the duration of a rebuild
    build_lock: Mutex<()>,
    counters: Counters,
}

impl ManifestCache {
    pub fn new(indexer: ManifestIndexer, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            indexer,
            ttl,
            clock,
            snapshot: RwLock::new(None),
            build_lock: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    /// Get the current manifest, rebuilding it when missing or expired.
    ///
    /// While another caller is rebuilding, an expired manifest is returned
    /// as is; a caller with nothing cached waits for the build. A failed
    /// rebuild falls back to the previous manifest when there is one.
    pub async fn get(&self) -> ManifestResult<Arc<Manifest>> {
        let current = self.current();
        if let Some(snapshot) = &current {
            if snapshot.is_fresh(self.clock.now(), self.ttl) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(snapshot.manifest.clone());
            }
        }

        let guard = match &current {
            Some(stale) => match self.build_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                    debug!("Rebuild in flight, serving expired manifest");
                    return Ok(stale.manifest.clone());
                }
            },
            None => self.build_lock.lock().await,
        };

        // Another caller may have finished a build while we waited
        if let Some(snapshot) = self.current() {
            if snapshot.is_fresh(self.clock.now(), self.ttl) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(snapshot.manifest.clone());
            }
        }

        self.rebuild(guard).await
    }

    async fn rebuild(&self, _guard: MutexGuard<'_, ()>) -> ManifestResult<Arc<Manifest>> {
        match self.indexer.build().await {
            Ok(manifest) => {
                let manifest = Arc::new(manifest);
                let snapshot = Arc::new(Snapshot {
                    manifest: manifest.clone(),
                    built_at: self.clock.now(),
                });
                *self.snapshot.write() = Some(snapshot);
                self.counters.builds.fetch_add(1, Ordering::Relaxed);
                info!(packs = manifest.packs().len(), "Manifest cached");
                Ok(manifest)
            }
            Err(err) => {
                self.counters.failed_builds.fetch_add(1, Ordering::Relaxed);
                match self.current() {
                    Some(previous) => {
                        self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %err, "Manifest rebuild failed, serving previous manifest");
                        Ok(previous.manifest.clone())
                    }
                    None => Err(err),
                }
            }
        }
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().clone()
    }

    /// The cached manifest without triggering a rebuild
    pub fn peek(&self) -> Option<Arc<Manifest>> {
        self.current().map(|snapshot| snapshot.manifest.clone())
    }

    /// When the cached manifest was built
    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.current().map(|snapshot| snapshot.built_at)
    }

    /// Mark the cached manifest as expired.
    ///
    /// It is still served if the next rebuild fails.
    pub fn invalidate(&self) {
        let mut slot = self.snapshot.write();
        if let Some(snapshot) = slot.take() {
            *slot = Some(Arc::new(Snapshot {
                manifest: snapshot.manifest.clone(),
                built_at: DateTime::<Utc>::MIN_UTC,
            }));
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> ManifestCacheStats {
        ManifestCacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            failed_builds: self.counters.failed_builds.load(Ordering::Relaxed),
            stale_served: self.counters.stale_served.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests;
