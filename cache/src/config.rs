use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of shards.
pub const DEFAULT_SHARD_COUNT: usize = 32;
/// Default sliding time-to-live for entries written without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
/// Default interval between janitor sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
/// Default absolute lifetime of an entry, regardless of touches.
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// The immutable settings of a map.
///
/// Populate it directly (or deserialize it with the `serde` feature) and hand
/// it to [`CacheBuilder::from_config`](crate::CacheBuilder::from_config), or
/// use the builder's setters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CacheConfig {
  /// Number of independently locked partitions. Must be greater than zero.
  pub shard_count: usize,
  /// TTL applied by `set`, `fetch` and `background_update` when none is given.
  pub default_ttl: Duration,
  /// How often each shard's janitor sweeps expired entries. Must be non-zero.
  pub cleanup_interval: Duration,
  /// Absolute ceiling on an entry's lifetime, counted from its write.
  pub max_lifetime: Duration,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      shard_count: DEFAULT_SHARD_COUNT,
      default_ttl: DEFAULT_TTL,
      cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
      max_lifetime: DEFAULT_MAX_LIFETIME,
    }
  }
}
