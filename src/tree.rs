//! Collaborator traits at the cache boundary.
//!
//! The cache never looks inside a tenant tree; it only needs to build one on a
//! miss ([`TreeBuilder`]) and to ask a resident one to shed internally stale
//! items ([`TenantTree::trim`]). Tree construction, persistence, and query
//! semantics are owned by the host application.

use std::future::Future;
use std::time::Instant;

use crate::key::TenantKey;

/// Boxed error type produced by tree builders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A tenant-scoped permission/condition tree.
///
/// Trees are immutable once built, except for [`trim`](Self::trim), which the
/// background janitor invokes periodically while the tree stays resident.
pub trait TenantTree: Send + Sync + 'static {
    /// Removes items whose internal timestamp is older than `cutoff`.
    ///
    /// Called on every janitor pass, independent of whole-entry eviction, so
    /// that a long-lived, frequently-accessed tree still sheds stale
    /// sub-items. Must be cheap relative to a full rebuild.
    fn trim(&self, cutoff: Instant);
}

/// Builds tenant trees on cache misses.
///
/// A build is expensive and may take arbitrary time (typically a database
/// scan) and may fail. The cache guarantees at most one concurrent build per
/// tenant key and never caches failures.
///
/// ## Example
///
/// ```rust,ignore
/// struct DbTreeBuilder { pool: Pool }
///
/// impl TreeBuilder<ConditionTree> for DbTreeBuilder {
///     fn build(
///         &self,
///         key: TenantKey,
///     ) -> impl Future<Output = Result<ConditionTree, BoxError>> + Send {
///         let pool = self.pool.clone();
///         async move { ConditionTree::scan(&pool, key).await.map_err(Into::into) }
///     }
/// }
/// ```
pub trait TreeBuilder<T: TenantTree>: Send + Sync + 'static {
    /// Builds the tree for `key`.
    fn build(&self, key: TenantKey) -> impl Future<Output = Result<T, BoxError>> + Send;
}
