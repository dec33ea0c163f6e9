//! Tenant key type.

use std::fmt;

/// Opaque identifier for a tenant whose permission tree is cached.
///
/// Keys are positive integers and are never interpreted beyond equality and
/// hashing. Zero is not a valid tenant identifier.
///
/// ## Example
///
/// ```rust
/// use permtree::TenantKey;
///
/// let key = TenantKey::new(42).unwrap();
/// assert_eq!(key.get(), 42);
/// assert!(TenantKey::new(0).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantKey(u64);

impl TenantKey {
    /// Creates a tenant key, rejecting the invalid zero identifier.
    pub fn new(id: u64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    /// Returns the raw identifier.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for TenantKey {
    type Error = InvalidTenantKey;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        Self::new(id).ok_or(InvalidTenantKey)
    }
}

impl From<TenantKey> for u64 {
    fn from(key: TenantKey) -> Self {
        key.get()
    }
}

/// Error returned when converting an invalid identifier into a [`TenantKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("tenant key must be a positive integer")]
pub struct InvalidTenantKey;
