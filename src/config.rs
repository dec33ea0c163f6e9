//! Configuration for the tenant tree cache.

use std::time::Duration;

/// Default access-based expiry window: 6 minutes.
const DEFAULT_TTL: Duration = Duration::from_millis(360_000);

/// Default janitor period: 20 seconds.
const DEFAULT_JANITOR_PERIOD: Duration = Duration::from_millis(20_000);

/// Configuration for a cache manager instance.
///
/// The TTL is both the whole-entry expiry window and the cutoff handed to
/// each resident tree's trim pass. Durations serialize as integer
/// milliseconds under the keys `ttl_millis` and `janitor_period_millis`.
///
/// ## Example
///
/// ```rust
/// use permtree::CacheConfig;
/// use std::time::Duration;
///
/// // Shorter expiry for frequently changing permission data
/// let config = CacheConfig::builder()
///     .ttl(Duration::from_secs(60))
///     .janitor_period(Duration::from_secs(5))
///     .build();
///
/// // Feature off: get_for fails, try_get_for always reports absent
/// let config = CacheConfig::builder().enabled(false).build();
/// ```
#[derive(Debug, Clone, bon::Builder, serde::Serialize, serde::Deserialize)]
pub struct CacheConfig {
    /// Whether the cache feature is enabled.
    ///
    /// Captured once at manager construction, not re-checked per call.
    #[builder(default = true)]
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Access-based time-to-live for resident entries.
    ///
    /// An entry unaccessed for this window is evicted on the next janitor
    /// sweep; the same window is the internal-trim cutoff.
    #[builder(default = DEFAULT_TTL)]
    #[serde(rename = "ttl_millis", with = "duration_millis", default = "default_ttl")]
    pub ttl: Duration,

    /// Fixed period of the background janitor.
    #[builder(default = DEFAULT_JANITOR_PERIOD)]
    #[serde(
        rename = "janitor_period_millis",
        with = "duration_millis",
        default = "default_janitor_period"
    )]
    pub janitor_period: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_ttl() -> Duration {
    DEFAULT_TTL
}

fn default_janitor_period() -> Duration {
    DEFAULT_JANITOR_PERIOD
}

/// Serde helper for Duration as milliseconds.
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
