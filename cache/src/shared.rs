use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::keylock::KeyLock;
use crate::listener::RemovalCallback;
use crate::metrics::Metrics;
use crate::store::ShardedStore;
use crate::value::Value;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The internal, thread-safe core of the map.
pub(crate) struct CacheShared<H> {
  pub(crate) store: ShardedStore<H>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) config: CacheConfig,
  pub(crate) key_lock: Arc<KeyLock>,
}

impl<H> fmt::Debug for CacheShared<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("config", &self.config)
      .field("store", &self.store)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<H> CacheShared<H> {
  /// Builds an entry using the configured defaults for anything not given.
  pub(crate) fn new_entry(
    &self,
    value: Value,
    ttl: Option<Duration>,
    on_remove: Option<RemovalCallback>,
  ) -> CacheEntry {
    CacheEntry::new(
      value,
      ttl.unwrap_or(self.config.default_ttl),
      self.config.max_lifetime,
      on_remove,
    )
  }
}

impl<H> Drop for CacheShared<H> {
  fn drop(&mut self) {
    self.store.close();
  }
}
