use crate::config::CacheConfig;
use crate::error::BuildError;
use crate::handles::Cache;
use crate::keylock::KeyLock;
use crate::metrics::Metrics;
use crate::shared::CacheShared;
use crate::store::ShardedStore;

use core::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;
use std::time::Duration;

/// A builder for creating [`Cache`] instances.
///
/// # Example
///
/// ```
/// use fibre_ttlmap::CacheBuilder;
/// use std::time::Duration;
///
/// let cache = CacheBuilder::new()
///   .shards(8)
///   .default_ttl(Duration::from_secs(30))
///   .cleanup_interval(Duration::from_secs(5))
///   .build()
///   .unwrap();
///
/// cache.set("answer", 42_u32);
/// assert_eq!(cache.get_as::<u32>("answer").as_deref(), Some(&42));
/// ```
pub struct CacheBuilder<H = ahash::RandomState> {
  config: CacheConfig,
  hasher: H,
  key_lock: Option<Arc<KeyLock>>,
}

// Manual Debug implementation for CacheBuilder.
impl<H> fmt::Debug for CacheBuilder<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("config", &self.config)
      .field("shared_key_lock", &self.key_lock.is_some())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<H> CacheBuilder<H> {
  /// Sets the number of independently locked shards. Must be non-zero.
  ///
  /// Unlike capacity-bounded caches the count is used as given, not rounded.
  pub fn shards(mut self, shards: usize) -> Self {
    self.config.shard_count = shards;
    self
  }

  /// Sets the TTL used when an entry is written without an explicit one.
  pub fn default_ttl(mut self, ttl: Duration) -> Self {
    self.config.default_ttl = ttl;
    self
  }

  /// Sets how often each shard's janitor sweeps expired entries.
  pub fn cleanup_interval(mut self, interval: Duration) -> Self {
    self.config.cleanup_interval = interval;
    self
  }

  /// Sets the absolute lifetime of every entry, counted from its write.
  pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
    self.config.max_lifetime = lifetime;
    self
  }

  /// Makes the map coordinate `background_update` calls through `key_lock`
  /// instead of a private registry. Maps sharing a `KeyLock` never run two
  /// updaters for the same key string at once.
  pub fn key_lock(mut self, key_lock: Arc<KeyLock>) -> Self {
    self.key_lock = Some(key_lock);
    self
  }

  /// Replaces the hasher used to pick a key's shard.
  pub fn hasher<H2>(self, hasher: H2) -> CacheBuilder<H2> {
    CacheBuilder {
      config: self.config,
      hasher,
      key_lock: self.key_lock,
    }
  }

  /// The configuration accumulated so far.
  pub fn config(&self) -> &CacheConfig {
    &self.config
  }
}

// --- Default Constructor ---
impl CacheBuilder<ahash::RandomState> {
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self::from_config(CacheConfig::default())
  }

  /// Creates a builder starting from a fully populated configuration.
  pub fn from_config(config: CacheConfig) -> Self {
    Self {
      config,
      hasher: ahash::RandomState::new(),
      key_lock: None,
    }
  }
}

impl Default for CacheBuilder<ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(feature = "rapidhash")]
impl CacheBuilder<rapidhash::RapidBuildHasher> {
  /// A builder using the unseeded rapidhash hasher, so shard assignment is
  /// identical across runs and processes.
  pub fn rapidhash() -> Self {
    CacheBuilder::new().hasher(rapidhash::RapidBuildHasher::default())
  }
}

// --- Build Methods ---
impl<H: BuildHasher> CacheBuilder<H> {
  /// Builds the map and starts one janitor thread per shard.
  pub fn build(self) -> Result<Cache<H>, BuildError> {
    self.validate()?;

    let metrics = Arc::new(Metrics::new());
    let store = ShardedStore::new(&self.config, self.hasher, &metrics)?;
    let key_lock = self.key_lock.unwrap_or_default();

    Ok(Cache {
      shared: Arc::new(CacheShared {
        store,
        metrics,
        config: self.config,
        key_lock,
      }),
    })
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.config.shard_count == 0 {
      return Err(BuildError::ZeroShards);
    }
    if self.config.cleanup_interval.is_zero() {
      return Err(BuildError::ZeroCleanupInterval);
    }
    Ok(())
  }
}
