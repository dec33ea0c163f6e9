//! The per-tenant tree cache: resident trees with access-based expiry,
//! misses routed through the single-flight loader.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::key::TenantKey;
use crate::single_flight::SingleFlight;
use crate::tree::{BoxError, TenantTree};

/// A resident tree plus its last-access stamp.
struct CacheEntry<T> {
    tree: Arc<T>,
    /// Milliseconds since the cache epoch, refreshed on every access.
    last_access: AtomicU64,
}

/// Strongly-typed cache of tenant trees.
///
/// The tree map and the in-flight registry are the only shared mutable state;
/// both are internally synchronized, so callers need no external locking.
/// Locks are never held across an `.await`.
///
/// Eviction is access-based: an entry unaccessed for the TTL window is
/// removed by [`sweep_expired`](Self::sweep_expired). Eviction never
/// invalidates `Arc<T>` handles already returned to callers.
pub struct TreeCache<T: TenantTree> {
    trees: RwLock<HashMap<TenantKey, CacheEntry<T>>>,
    flights: SingleFlight<T>,
    ttl: Duration,
    /// Monotonic reference point for access stamps.
    epoch: Instant,
}

impl<T: TenantTree> TreeCache<T> {
    /// Creates an empty cache with the given access-expiry window.
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            trees: RwLock::new(HashMap::new()),
            flights: SingleFlight::new(),
            ttl,
            epoch: Instant::now(),
        })
    }

    /// The access-expiry window this cache was created with.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Non-blocking lookup. Never builds and never awaits an in-flight build
    /// by another caller; a tree under construction is simply not visible
    /// yet. Refreshes the access stamp on a hit.
    pub fn peek(&self, key: TenantKey) -> Option<Arc<T>> {
        let trees = self.trees.read();
        let entry = trees.get(&key)?;
        entry.last_access.store(self.now_millis(), Ordering::Relaxed);
        trace!(%key, "tenant tree cache hit");
        Some(Arc::clone(&entry.tree))
    }

    /// Returns the resident tree for `key`, building it on a miss.
    ///
    /// Concurrent callers for the same key collapse into one build and all
    /// observe its outcome. A failed build propagates to exactly the callers
    /// of that flight, is never cached, and leaves the slot clear so the next
    /// call retries fresh.
    ///
    /// Completion bookkeeping runs inside the shared future, under whichever
    /// caller polls it to completion, so a cancelled initiator cannot leave a
    /// stale flight behind.
    pub async fn get_or_load<F, Fut>(self: &Arc<Self>, key: TenantKey, build: F) -> Result<Arc<T>>
    where
        F: FnOnce(TenantKey) -> Fut,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        if let Some(tree) = self.peek(key) {
            return Ok(tree);
        }

        let shared = self.flights.join_or_begin(key, |generation| {
            let cache = Arc::clone(self);
            let fut = build(key);
            Box::pin(async move {
                let built = fut.await;
                match built {
                    Ok(tree) => {
                        let tree = Arc::new(tree);
                        let installed = cache.flights.finish_if_owned(key, generation, || {
                            cache.install(key, Arc::clone(&tree));
                        });
                        if !installed {
                            debug!(%key, "tenant tree build finished after invalidation, discarding");
                        }
                        Ok(tree)
                    }
                    Err(source) => {
                        warn!(%key, error = %source, "tenant tree build failed");
                        cache.flights.finish_if_owned(key, generation, || {});
                        Err(Error::build_failed(key, source))
                    }
                }
            })
        });

        shared.await
    }

    /// Installs a freshly built tree with a fresh access stamp.
    fn install(&self, key: TenantKey, tree: Arc<T>) {
        let entry = CacheEntry { tree, last_access: AtomicU64::new(self.now_millis()) };
        self.trees.write().insert(key, entry);
        debug!(%key, "tenant tree installed");
    }

    /// Removes the entry for `key` and forgets any in-flight build for it.
    ///
    /// A build already running for `key` completes normally for its callers,
    /// but its result is discarded instead of installed: the slot is taken
    /// away here, and installation only happens while the flight still owns
    /// its slot.
    pub fn invalidate(&self, key: TenantKey) {
        self.flights.forget_with(key, || {
            if self.trees.write().remove(&key).is_some() {
                debug!(%key, "tenant tree invalidated");
            }
        });
    }

    /// Drops every entry and every in-flight slot (shutdown path).
    pub fn clear(&self) {
        self.flights.forget_all_with(|| {
            let mut trees = self.trees.write();
            let dropped = trees.len();
            trees.clear();
            if dropped > 0 {
                debug!(dropped, "tenant tree cache cleared");
            }
        });
    }

    /// Removes entries unaccessed for at least the TTL window and returns
    /// how many were evicted. Called by the background janitor.
    pub fn sweep_expired(&self) -> usize {
        let now = self.now_millis();
        let ttl = self.ttl.as_millis() as u64;
        let mut trees = self.trees.write();
        let before = trees.len();
        // Expired means now - last_access >= ttl, inclusive.
        trees.retain(|_, entry| now.saturating_sub(entry.last_access.load(Ordering::Relaxed)) < ttl);
        let evicted = before - trees.len();
        if evicted > 0 {
            debug!(evicted, "swept expired tenant trees");
        }
        evicted
    }

    /// A weakly consistent snapshot of the resident trees, for the janitor's
    /// trim pass. The snapshot tolerates concurrent insertion and removal; a
    /// tree evicted after the snapshot is trimmed once more harmlessly via
    /// its own `Arc`.
    pub fn snapshot_resident(&self) -> Vec<(TenantKey, Arc<T>)> {
        self.trees.read().iter().map(|(key, entry)| (*key, Arc::clone(&entry.tree))).collect()
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.trees.read().len()
    }

    /// Returns `true` if no trees are resident.
    pub fn is_empty(&self) -> bool {
        self.trees.read().is_empty()
    }
}
