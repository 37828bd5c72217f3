use crate::builder::CacheBuilder;
use crate::config::CacheConfig;
use crate::entry::Item;
use crate::keylock::KeyLock;
use crate::listener::{RemovalCallback, RemovalCause};
use crate::metrics::MetricsSnapshot;
use crate::shared::CacheShared;
use crate::value::Value;

use std::any::Any;
use std::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::{HashMap, HashMapExt};
#[cfg(feature = "bulk")]
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

/// A thread-safe, sharded map whose entries expire.
///
/// Every entry has a sliding TTL, pushed forward whenever it is read with a
/// touch, and an absolute deadline set when it is written that no touch can
/// move. Expired entries stop being visible immediately and are physically
/// removed by one janitor thread per shard.
///
/// Cloning a `Cache` is cheap and yields another handle to the same map. The
/// janitors stop when [`close`](Self::close) is called or the last handle is
/// dropped.
pub struct Cache<H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<H>>,
}

impl<H> Clone for Cache<H> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<H> fmt::Debug for Cache<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache").field("shared", &self.shared).finish()
  }
}

impl Cache {
  /// Shorthand for [`CacheBuilder::new`].
  pub fn builder() -> CacheBuilder {
    CacheBuilder::new()
  }
}

impl<H> Cache<H> {
  /// The settings this map was built with.
  pub fn config(&self) -> &CacheConfig {
    &self.shared.config
  }

  pub fn shard_count(&self) -> usize {
    self.shared.store.shards.len()
  }

  /// Returns a snapshot of the map's current metrics.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// The registry coordinating [`background_update`](Self::background_update)
  /// calls on this map.
  pub fn key_lock(&self) -> &Arc<KeyLock> {
    &self.shared.key_lock
  }

  /// Blocks until no background update holds `key`.
  pub fn wait_for_update(&self, key: &str) {
    self.shared.key_lock.wait(key);
  }

  /// Stops every shard's janitor.
  ///
  /// The map stays usable afterwards, but expired entries are only removed
  /// by an explicit [`sweep`](Self::sweep). Closing twice is a no-op.
  pub fn close(&self) {
    self.shared.store.close();
  }

  /// Returns `true` once every janitor has been stopped.
  pub fn is_closed(&self) -> bool {
    self.shared.store.iter_shards().all(|shard| shard.is_closed())
  }

  /// Number of stored entries, counting expired ones not yet swept.
  pub fn len(&self) -> usize {
    self.shared.store.iter_shards().map(|shard| shard.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.store.iter_shards().all(|shard| shard.len() == 0)
  }

  /// Discards every entry without running any removal callback.
  ///
  /// Returns the number of entries discarded.
  pub fn flush(&self) -> usize {
    self.shared.store.iter_shards().map(|shard| shard.flush()).sum()
  }

  /// Runs one cleanup pass over every shard on the calling thread.
  ///
  /// Each expired entry is removed and its removal callback is invoked with
  /// [`RemovalCause::Expired`]. Returns the number of entries removed.
  pub fn sweep(&self) -> usize {
    self.shared.store.iter_shards().map(|shard| shard.sweep()).sum()
  }

  /// Returns every live key/value pair.
  ///
  /// Each shard is copied under its own read lock, so the result is
  /// consistent per shard but not across shards.
  pub fn items(&self) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    for shard in self.shared.store.iter_shards() {
      shard.collect_live(&mut out);
    }
    out
  }
}

impl<H: BuildHasher> Cache<H> {
  /// The index of the shard owning `key`.
  pub fn shard_for(&self, key: &str) -> usize {
    self.shared.store.get_shard_index(key)
  }

  /// Stores `value` under `key` with the default TTL.
  ///
  /// Any existing entry is replaced and its removal callback is not run.
  pub fn set<T>(&self, key: impl Into<String>, value: T)
  where
    T: Any + Send + Sync,
  {
    self.insert(key.into(), Value::new(value), None, None);
  }

  /// Stores `value` under `key` with an explicit TTL.
  pub fn set_with_ttl<T>(&self, key: impl Into<String>, value: T, ttl: Duration)
  where
    T: Any + Send + Sync,
  {
    self.insert(key.into(), Value::new(value), Some(ttl), None);
  }

  /// Stores `value` with a callback that runs once when the entry is
  /// removed by [`remove`](Self::remove) or swept after expiry.
  ///
  /// The callback runs while the shard's write lock is held and must not
  /// call back into this map. `ttl` falls back to the default when `None`.
  pub fn set_with_callback<T, F>(
    &self,
    key: impl Into<String>,
    value: T,
    ttl: Option<Duration>,
    on_remove: F,
  ) where
    T: Any + Send + Sync,
    F: FnOnce(&str, &Value, RemovalCause) + Send + 'static,
  {
    let callback: RemovalCallback = Box::new(on_remove);
    self.insert(key.into(), Value::new(value), ttl, Some(callback));
  }

  fn insert(
    &self,
    key: String,
    value: Value,
    ttl: Option<Duration>,
    on_remove: Option<RemovalCallback>,
  ) {
    let entry = self.shared.new_entry(value, ttl, on_remove);
    self.shared.store.get_shard(&key).insert(key, entry);
  }

  /// Returns the live value for `key`, sliding its expiry forward.
  pub fn get(&self, key: &str) -> Option<Value> {
    self.touch_get(key, true)
  }

  /// Returns the live value for `key`, sliding its expiry forward only when
  /// `touch` is `true`.
  ///
  /// An expired entry reads as missing; it stays stored until swept.
  pub fn touch_get(&self, key: &str, touch: bool) -> Option<Value> {
    self.shared.store.get_shard(key).get(key, touch)
  }

  /// Like [`get`](Self::get), but also returns `None` if the value is not a `T`.
  pub fn get_as<T>(&self, key: &str) -> Option<Arc<T>>
  where
    T: Any + Send + Sync,
  {
    self.get(key).and_then(|value| value.downcast::<T>())
  }

  /// Returns `true` if `key` holds an entry that has not expired.
  pub fn has(&self, key: &str) -> bool {
    self.shared.store.get_shard(key).has(key)
  }

  /// Removes `key`, running its removal callback before returning.
  ///
  /// Returns `false` if nothing was stored under `key`.
  pub fn remove(&self, key: &str) -> bool {
    self.shared.store.get_shard(key).remove(key)
  }

  /// The current sliding expiry of `key`, whether or not it has passed.
  pub fn get_expiry(&self, key: &str) -> Option<Instant> {
    self.shared.store.get_shard(key).expiry(key)
  }

  /// A detached copy of the entry stored under `key`, expired or not.
  pub fn get_item(&self, key: &str) -> Option<Item> {
    self.shared.store.get_shard(key).item(key)
  }
}

impl<H: BuildHasher + Send + Sync> Cache<H> {
  /// Stores every pair from `items` with one TTL (the default when `None`).
  ///
  /// Items are grouped by shard and each shard's write lock is taken once.
  /// With the `bulk` feature the shards are written in parallel.
  pub fn mset<I, K, T>(&self, items: I, ttl: Option<Duration>)
  where
    I: IntoIterator<Item = (K, T)>,
    K: Into<String>,
    T: Any + Send + Sync,
  {
    let store = &self.shared.store;
    let mut items_by_shard: Vec<Vec<(String, Value)>> = Vec::with_capacity(store.shards.len());
    for _ in 0..store.shards.len() {
      items_by_shard.push(Vec::new());
    }

    for (key, value) in items {
      let key = key.into();
      let index = store.get_shard_index(&key);
      items_by_shard[index].push((key, Value::new(value)));
    }

    let write_shard = |(index, shard_items): (usize, Vec<(String, Value)>)| {
      if shard_items.is_empty() {
        return;
      }
      let shard = &store.shards[index];
      let mut guard = shard.map.write();
      for (key, value) in shard_items {
        let entry = self.shared.new_entry(value, ttl, None);
        shard.insert_locked(&mut guard, key, entry);
      }
    };

    #[cfg(feature = "bulk")]
    items_by_shard
      .into_par_iter()
      .enumerate()
      .for_each(write_shard);

    #[cfg(not(feature = "bulk"))]
    items_by_shard.into_iter().enumerate().for_each(write_shard);
  }
}
