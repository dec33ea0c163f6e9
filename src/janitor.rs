//! Background maintenance independent of request traffic.
//!
//! On a fixed period the janitor runs two passes in order: first it sweeps
//! whole entries that have gone unaccessed past the TTL, then it asks every
//! still-resident tree to trim items older than `now - ttl`. The second pass
//! is what lets a hot, never-evicted tree shed its internally stale
//! sub-items.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::TreeCache;
use crate::tree::TenantTree;

/// RAII handle for the janitor task.
///
/// Dropping the handle aborts the schedule; the manager holds exactly one and
/// releases it exactly once on stop.
pub struct JanitorHandle {
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Spawns the janitor for `cache`, waking every `period`.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn<T: TenantTree>(cache: Arc<TreeCache<T>>, period: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval fires immediately; a fresh cache has nothing to sweep.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_pass(&cache);
            }
        });
        Self { task }
    }

    /// Returns `true` if the janitor task has finished or been aborted.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for JanitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JanitorHandle").field("is_finished", &self.is_finished()).finish()
    }
}

/// One sweep-then-trim pass over the cache.
///
/// Operates on a defensive snapshot of the residents, so a trim racing with
/// an eviction works on the snapshot's own `Arc` rather than cache
/// internals. A panicking trim for one tenant is caught and logged; it never
/// aborts the pass for other tenants or kills the schedule.
fn run_pass<T: TenantTree>(cache: &TreeCache<T>) {
    let evicted = cache.sweep_expired();

    // Nothing inside a tree can be older than this process if the monotonic
    // clock has not yet advanced past one full window.
    let Some(cutoff) = Instant::now().checked_sub(cache.ttl()) else {
        debug!(evicted, "janitor pass complete, trim skipped (clock younger than window)");
        return;
    };

    let residents = cache.snapshot_resident();
    let trimmed = residents.len();
    for (key, tree) in residents {
        if catch_unwind(AssertUnwindSafe(|| tree.trim(cutoff))).is_err() {
            warn!(%key, "trim panicked for tenant tree, skipping");
        }
    }
    debug!(evicted, trimmed, "janitor pass complete");
}
