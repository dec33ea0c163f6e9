//! Single-flight deduplication of tenant tree builds.
//!
//! At most one build runs per tenant key; callers that arrive while a build
//! is in flight await the same [`Shared`] future instead of starting their
//! own. Each slot carries a generation counter so completion bookkeeping for
//! an old flight can never clobber a newer flight registered for the same key
//! after an invalidation.
//!
//! The slot lock also serializes completion against invalidation: a flight
//! installs its result only while it still owns its slot, and invalidation
//! removes the slot, so an invalidated build can never repopulate the cache.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt as _;
use futures::future::Shared;
use parking_lot::Mutex;

use crate::error::Error;
use crate::key::TenantKey;

/// Boxed build future, prior to sharing.
pub(crate) type BuildFuture<T> =
    Pin<Box<dyn Future<Output = Result<Arc<T>, Error>> + Send + 'static>>;

/// Outcome future shared between the flight that started a build and every
/// caller that joined it.
pub(crate) type SharedBuild<T> = Shared<BuildFuture<T>>;

/// One in-flight build.
struct Flight<T> {
    generation: u64,
    shared: SharedBuild<T>,
}

/// Per-key registry of in-flight builds.
///
/// Invariant: at most one flight exists per key at any instant.
pub(crate) struct SingleFlight<T> {
    flights: Mutex<HashMap<TenantKey, Flight<T>>>,
    next_generation: AtomicU64,
}

impl<T> SingleFlight<T> {
    pub(crate) fn new() -> Self {
        Self { flights: Mutex::new(HashMap::new()), next_generation: AtomicU64::new(0) }
    }

    /// Joins the in-flight build for `key`, or registers a new flight whose
    /// future is produced by `make` (which receives the new slot's
    /// generation). Returns the shared outcome future either way.
    pub(crate) fn join_or_begin<F>(&self, key: TenantKey, make: F) -> SharedBuild<T>
    where
        F: FnOnce(u64) -> BuildFuture<T>,
    {
        let mut flights = self.flights.lock();
        if let Some(flight) = flights.get(&key) {
            return flight.shared.clone();
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let shared = make(generation).shared();
        flights.insert(key, Flight { generation, shared: shared.clone() });
        shared
    }

    /// Deregisters the flight for `key` if `generation` still owns the slot,
    /// running `on_owned` under the slot lock before releasing it.
    ///
    /// Returns `true` if the caller was still the registered flight. A
    /// `false` return means an invalidation (or a newer flight) took the slot
    /// in the meantime and the result must be discarded, not installed.
    pub(crate) fn finish_if_owned<F>(&self, key: TenantKey, generation: u64, on_owned: F) -> bool
    where
        F: FnOnce(),
    {
        let mut flights = self.flights.lock();
        match flights.get(&key) {
            Some(flight) if flight.generation == generation => {
                flights.remove(&key);
                on_owned();
                true
            }
            _ => false,
        }
    }

    /// Unconditionally forgets any flight for `key`, running `and_then` under
    /// the slot lock (invalidation path: the resident entry is removed in the
    /// same critical section so a completing build cannot slip in between).
    pub(crate) fn forget_with<F>(&self, key: TenantKey, and_then: F)
    where
        F: FnOnce(),
    {
        let mut flights = self.flights.lock();
        flights.remove(&key);
        and_then();
    }

    /// Forgets every flight, running `and_then` under the slot lock
    /// (shutdown path).
    pub(crate) fn forget_all_with<F>(&self, and_then: F)
    where
        F: FnOnce(),
    {
        let mut flights = self.flights.lock();
        flights.clear();
        and_then();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.flights.lock().len()
    }
}
