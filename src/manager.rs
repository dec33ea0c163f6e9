//! Process-facing entry point: owns the cache, the tree builder, and the
//! janitor lifecycle.
//!
//! A [`CacheManager`] is an explicit handle rather than a hidden global. The
//! host constructs one [`ManagerSlot`] and injects it wherever the cache is
//! consumed; the slot tracks the single "current" instance and serializes
//! start/stop transitions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::TreeCache;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::janitor::JanitorHandle;
use crate::key::TenantKey;
use crate::tree::{TenantTree, TreeBuilder};

/// One running cache instance: the tree cache, its builder, and the janitor.
///
/// Created through [`ManagerSlot::start`] (or [`CacheManager::start`]
/// directly when the host does its own instance tracking). Stopping is
/// idempotent and terminal: a stopped handle reports
/// [`ManagerAbsent`](Error::ManagerAbsent) instead of serving stale reads.
pub struct CacheManager<T: TenantTree, B: TreeBuilder<T>> {
    cache: Arc<TreeCache<T>>,
    builder: Arc<B>,
    /// Feature flag, captured once at construction and never re-checked.
    enabled: bool,
    stopped: AtomicBool,
    janitor: Mutex<Option<JanitorHandle>>,
}

impl<T, B> CacheManager<T, B>
where
    T: TenantTree,
    B: TreeBuilder<T>,
{
    /// Creates a manager and starts its janitor on the configured period.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(config: CacheConfig, builder: B) -> Arc<Self> {
        let cache = TreeCache::new(config.ttl);
        let janitor = JanitorHandle::spawn(Arc::clone(&cache), config.janitor_period);
        info!(
            enabled = config.enabled,
            ttl_millis = config.ttl.as_millis() as u64,
            janitor_period_millis = config.janitor_period.as_millis() as u64,
            "tenant tree cache manager started"
        );
        Arc::new(Self {
            cache,
            builder: Arc::new(builder),
            enabled: config.enabled,
            stopped: AtomicBool::new(false),
            janitor: Mutex::new(Some(janitor)),
        })
    }

    /// Blocking path: returns the resident tree for `key`, awaiting a build
    /// on a miss.
    ///
    /// Concurrent calls for the same cold key collapse into one build. The
    /// call blocks for the full build duration; callers with a deadline wrap
    /// it in [`tokio::time::timeout`].
    pub async fn get_for(&self, key: TenantKey) -> Result<Arc<T>> {
        if !self.enabled {
            return Err(Error::Disabled);
        }
        if self.stopped.load(Ordering::Acquire) {
            return Err(Error::ManagerAbsent);
        }
        let builder = Arc::clone(&self.builder);
        self.cache.get_or_load(key, move |k| async move { builder.build(k).await }).await
    }

    /// Non-blocking path: the resident tree for `key`, or `None` immediately.
    ///
    /// Never waits on a build. When the tree is absent and
    /// `trigger_async_load` is set, a fire-and-forget build is spawned so a
    /// *future* call may hit; its failure is logged, never surfaced.
    pub fn try_get_for(&self, key: TenantKey, trigger_async_load: bool) -> Option<Arc<T>> {
        if !self.enabled || self.stopped.load(Ordering::Acquire) {
            return None;
        }
        if let Some(tree) = self.cache.peek(key) {
            return Some(tree);
        }
        if trigger_async_load {
            let cache = Arc::clone(&self.cache);
            let builder = Arc::clone(&self.builder);
            tokio::spawn(async move {
                let load =
                    cache.get_or_load(key, move |k| async move { builder.build(k).await }).await;
                if let Err(error) = load {
                    debug!(%key, %error, "background tenant tree build failed");
                }
            });
        }
        None
    }

    /// Explicit invalidation for when the tenant's underlying permission
    /// data changed and the cached tree must not be trusted anymore.
    ///
    /// Also cancels in-flight bookkeeping for `key`, so a build already
    /// running cannot repopulate the cache with known-stale data.
    pub fn drop_for(&self, key: TenantKey) {
        self.cache.invalidate(key);
    }

    /// Stops this instance: aborts the janitor and drops every entry.
    ///
    /// Idempotent. Afterwards [`get_for`](Self::get_for) reports
    /// [`ManagerAbsent`](Error::ManagerAbsent) and
    /// [`try_get_for`](Self::try_get_for) reports absent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // JanitorHandle aborts its task on drop; the slot is released once.
        drop(self.janitor.lock().take());
        self.cache.clear();
        info!("tenant tree cache manager stopped");
    }

    /// Returns `true` if this instance has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Number of currently resident trees.
    pub fn resident_count(&self) -> usize {
        self.cache.len()
    }
}

impl<T, B> std::fmt::Debug for CacheManager<T, B>
where
    T: TenantTree,
    B: TreeBuilder<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("enabled", &self.enabled)
            .field("stopped", &self.is_stopped())
            .field("resident", &self.resident_count())
            .finish()
    }
}

/// Holder of the "current" manager instance.
///
/// The slot mutex is the only start/stop race guard in the subsystem: two
/// threads racing to start cannot end up with two live instances.
///
/// ## Example
///
/// ```rust,ignore
/// let slot = ManagerSlot::new();
/// let manager = slot.start(CacheConfig::default(), builder);
///
/// // Elsewhere, with the slot injected:
/// match slot.instance() {
///     Some(manager) => { /* use manager.get_for(...) */ }
///     None => { /* expected state: fall back to the authoritative path */ }
/// }
/// ```
pub struct ManagerSlot<T: TenantTree, B: TreeBuilder<T>> {
    current: Mutex<Option<Arc<CacheManager<T, B>>>>,
}

impl<T, B> ManagerSlot<T, B>
where
    T: TenantTree,
    B: TreeBuilder<T>,
{
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self { current: Mutex::new(None) }
    }

    /// Starts a new manager instance, first stopping and discarding any
    /// existing one. Always leaves exactly one running instance; entries
    /// cached by the previous instance do not survive.
    pub fn start(&self, config: CacheConfig, builder: B) -> Arc<CacheManager<T, B>> {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            previous.stop();
        }
        let manager = CacheManager::start(config, builder);
        *current = Some(Arc::clone(&manager));
        manager
    }

    /// Stops the current instance, if any. Safe to call when nothing is
    /// running.
    pub fn stop(&self) {
        if let Some(manager) = self.current.lock().take() {
            manager.stop();
        }
    }

    /// The current running instance, or `None` when not started. Absence is
    /// an expected, recoverable state for callers, never a panic.
    pub fn instance(&self) -> Option<Arc<CacheManager<T, B>>> {
        self.current.lock().clone()
    }

    /// Convenience wrapper for [`CacheManager::get_for`] on the current
    /// instance; reports [`ManagerAbsent`](Error::ManagerAbsent) when none is
    /// running.
    pub async fn get_for(&self, key: TenantKey) -> Result<Arc<T>> {
        match self.instance() {
            Some(manager) => manager.get_for(key).await,
            None => Err(Error::ManagerAbsent),
        }
    }

    /// Convenience wrapper for [`CacheManager::try_get_for`]; absent when no
    /// instance is running.
    pub fn try_get_for(&self, key: TenantKey, trigger_async_load: bool) -> Option<Arc<T>> {
        self.instance().and_then(|manager| manager.try_get_for(key, trigger_async_load))
    }

    /// Convenience wrapper for [`CacheManager::drop_for`]; a no-op when no
    /// instance is running.
    pub fn drop_for(&self, key: TenantKey) {
        if let Some(manager) = self.instance() {
            manager.drop_for(key);
        }
    }
}

impl<T, B> Default for ManagerSlot<T, B>
where
    T: TenantTree,
    B: TreeBuilder<T>,
{
    fn default() -> Self {
        Self::new()
    }
}
