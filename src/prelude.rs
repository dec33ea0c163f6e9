//! Prelude module for convenient imports.
//!
//! ```rust
//! use permtree::prelude::*;
//! ```

pub use crate::{
    cache::TreeCache,
    config::CacheConfig,
    error::{Error, Result},
    janitor::JanitorHandle,
    key::{InvalidTenantKey, TenantKey},
    manager::{CacheManager, ManagerSlot},
    testing::{CountingBuilder, RecordingTree},
    tree::{BoxError, TenantTree, TreeBuilder},
};
