//! # permtree
//!
//! Per-tenant cache for expensive-to-build permission trees.
//!
//! A tenant's permission tree answers "can principal X see folder Y" queries
//! without re-querying durable storage on every request. Building one is
//! expensive (typically a full database scan), so this crate keeps trees
//! resident per tenant, deduplicates concurrent builds, and evicts on a
//! background schedule.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use permtree::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), permtree::Error> {
//!     let slot = ManagerSlot::new();
//!     let manager = slot.start(CacheConfig::default(), MyTreeBuilder::new(pool));
//!     let key = TenantKey::new(42).expect("nonzero tenant id");
//!
//!     // Blocking path: builds the tree on a cold cache.
//!     let tree = manager.get_for(key).await?;
//!
//!     // Non-blocking path: returns immediately, optionally warming in the
//!     // background so a later call can hit.
//!     if let Some(tree) = manager.try_get_for(key, true) {
//!         // resident, use it
//!     }
//!
//!     // The underlying permission data changed; the cached tree must go.
//!     manager.drop_for(key);
//!
//!     slot.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Key Concepts
//!
//! - **Single-flight**: concurrent requests for the same tenant collapse into
//!   at most one build; every caller observes the same outcome.
//! - **Access TTL**: an entry unaccessed for the TTL window is evicted by the
//!   background janitor.
//! - **Trim**: independently of whole-entry eviction, every still-resident
//!   tree periodically sheds its internally stale sub-items.
//! - **Handles outlive eviction**: an `Arc<T>` returned to a caller stays
//!   valid after the entry is evicted; eviction only stops future hits.
//!
//! ## Non-goals
//!
//! Not a distributed cache (no cross-node coherence), not write-through
//! (trees are immutable once built, until dropped), and not a general-purpose
//! cache library.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Core modules
pub mod cache;
pub mod config;
pub mod error;
pub mod janitor;
pub mod key;
pub mod manager;
pub mod tree;

// Single-flight build deduplication (internal to the cache)
mod single_flight;

// Testing utilities
pub mod testing;

// Prelude for convenient imports
pub mod prelude;

// Re-export main types at crate root for convenience
pub use cache::TreeCache;
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use janitor::JanitorHandle;
pub use key::{InvalidTenantKey, TenantKey};
pub use manager::{CacheManager, ManagerSlot};
pub use tree::{BoxError, TenantTree, TreeBuilder};
