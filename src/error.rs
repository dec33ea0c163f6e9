//! Error types for the tenant tree cache.
//!
//! Every failure in this subsystem is recoverable: [`Disabled`] and
//! [`ManagerAbsent`] are expected states callers handle by falling back to
//! the slower authoritative path, and a [`BuildFailed`] is local to the
//! triggering call. It is never cached, so the next call for the same key
//! gets a fresh attempt.
//!
//! [`Disabled`]: Error::Disabled
//! [`ManagerAbsent`]: Error::ManagerAbsent
//! [`BuildFailed`]: Error::BuildFailed

use crate::key::TenantKey;
use crate::tree::BoxError;

/// Errors surfaced by the tenant tree cache.
///
/// The type is `Clone` so that a single failed build can hand the same error
/// to every caller that joined that flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The cache feature is turned off by configuration.
    ///
    /// Checked once at manager construction; `get_for` fails with this and
    /// `try_get_for` reports absent without attempting any load.
    #[error("tenant tree cache is disabled by configuration")]
    Disabled,

    /// No cache manager is currently running.
    ///
    /// An expected, handleable state: callers fall back to the
    /// authoritative path, they do not crash.
    #[error("no tenant tree cache manager is running")]
    ManagerAbsent,

    /// Building the tenant tree failed.
    ///
    /// Surfaced to every caller of the failed flight, never cached, never
    /// retried automatically.
    #[error("building tenant tree for tenant {key} failed: {message}")]
    BuildFailed {
        /// The tenant whose build failed.
        key: TenantKey,
        /// Description of the underlying build error.
        message: String,
    },
}

impl Error {
    /// Wraps a builder error for `key`.
    pub(crate) fn build_failed(key: TenantKey, source: BoxError) -> Self {
        Error::BuildFailed { key, message: source.to_string() }
    }

    /// Returns `true` if this error is a build failure.
    pub fn is_build_failed(&self) -> bool {
        matches!(self, Error::BuildFailed { .. })
    }
}

/// A specialized `Result` type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
