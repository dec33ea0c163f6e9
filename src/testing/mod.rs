//! Test doubles for exercising the cache without a real tree subsystem.
//!
//! - [`RecordingTree`]: a [`TenantTree`] that records every trim cutoff it
//!   receives.
//! - [`CountingBuilder`]: a [`TreeBuilder`] that counts builds per tenant,
//!   with configurable artificial delay and scripted failures.
//!
//! Both doubles are cheap `Clone`s over shared state, so a test can keep a
//! handle after moving the double into a manager.
//!
//! ## Example
//!
//! ```rust
//! use permtree::testing::CountingBuilder;
//! use permtree::{CacheConfig, ManagerSlot, TenantKey};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let builder = CountingBuilder::new();
//! let slot = ManagerSlot::new();
//! let manager = slot.start(CacheConfig::default(), builder.clone());
//!
//! let key = TenantKey::new(1).unwrap();
//! manager.get_for(key).await.unwrap();
//! manager.get_for(key).await.unwrap();
//! assert_eq!(builder.build_count(key), 1);
//! # slot.stop();
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::key::TenantKey;
use crate::tree::{BoxError, TenantTree, TreeBuilder};

/// A [`TenantTree`] double that records every `trim` cutoff it receives.
///
/// Supports a panic-on-trim switch for janitor isolation tests.
#[derive(Debug)]
pub struct RecordingTree {
    key: TenantKey,
    trims: Mutex<Vec<Instant>>,
    panic_on_trim: AtomicBool,
}

impl RecordingTree {
    /// Creates a tree double for `key`.
    pub fn new(key: TenantKey) -> Self {
        Self { key, trims: Mutex::new(Vec::new()), panic_on_trim: AtomicBool::new(false) }
    }

    /// The tenant this tree was built for.
    pub fn key(&self) -> TenantKey {
        self.key
    }

    /// How many times `trim` has been called.
    pub fn trim_count(&self) -> usize {
        self.trims.lock().len()
    }

    /// Every cutoff passed to `trim`, in call order.
    pub fn trim_cutoffs(&self) -> Vec<Instant> {
        self.trims.lock().clone()
    }

    /// Makes every subsequent `trim` call panic, for janitor isolation tests.
    pub fn panic_on_trim(&self) {
        self.panic_on_trim.store(true, Ordering::SeqCst);
    }
}

impl TenantTree for RecordingTree {
    #[allow(clippy::panic)]
    fn trim(&self, cutoff: Instant) {
        if self.panic_on_trim.load(Ordering::SeqCst) {
            panic!("RecordingTree: scripted trim panic for tenant {}", self.key);
        }
        self.trims.lock().push(cutoff);
    }
}

/// A [`TreeBuilder`] double producing [`RecordingTree`]s.
///
/// Counts build invocations per tenant and supports a global artificial
/// delay, per-tenant delays, and scripted per-tenant failures. Builds are
/// counted per builder invocation; callers that join an in-flight build never
/// invoke the builder, so they do not inflate the count.
#[derive(Debug, Clone, Default)]
pub struct CountingBuilder {
    inner: Arc<BuilderState>,
}

#[derive(Debug, Default)]
struct BuilderState {
    delay: Mutex<Duration>,
    delays: Mutex<HashMap<TenantKey, Duration>>,
    builds: Mutex<HashMap<TenantKey, usize>>,
    failing: Mutex<HashSet<TenantKey>>,
}

impl CountingBuilder {
    /// Creates a builder with no delay and no scripted failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder whose every build sleeps for `delay` first.
    pub fn with_delay(delay: Duration) -> Self {
        let builder = Self::default();
        *builder.inner.delay.lock() = delay;
        builder
    }

    /// Overrides the build delay for one tenant.
    pub fn delay_for(&self, key: TenantKey, delay: Duration) {
        self.inner.delays.lock().insert(key, delay);
    }

    /// Scripts builds for `key` to fail until [`succeed_for`](Self::succeed_for).
    pub fn fail_for(&self, key: TenantKey) {
        self.inner.failing.lock().insert(key);
    }

    /// Clears a scripted failure for `key`.
    pub fn succeed_for(&self, key: TenantKey) {
        self.inner.failing.lock().remove(&key);
    }

    /// Number of builds actually executed for `key`.
    pub fn build_count(&self, key: TenantKey) -> usize {
        self.inner.builds.lock().get(&key).copied().unwrap_or(0)
    }

    /// Total builds executed across all tenants.
    pub fn total_builds(&self) -> usize {
        self.inner.builds.lock().values().sum()
    }
}

impl TreeBuilder<RecordingTree> for CountingBuilder {
    fn build(
        &self,
        key: TenantKey,
    ) -> impl Future<Output = Result<RecordingTree, BoxError>> + Send {
        *self.inner.builds.lock().entry(key).or_insert(0) += 1;
        let delay =
            self.inner.delays.lock().get(&key).copied().unwrap_or(*self.inner.delay.lock());
        let fail = self.inner.failing.lock().contains(&key);
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fail {
                return Err(format!("scripted build failure for tenant {key}").into());
            }
            Ok(RecordingTree::new(key))
        }
    }
}
