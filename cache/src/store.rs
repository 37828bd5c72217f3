use crate::config::CacheConfig;
use crate::entry::{CacheEntry, Item};
use crate::error::BuildError;
use crate::listener::RemovalCause;
use crate::metrics::Metrics;
use crate::task::janitor::Janitor;
use crate::value::Value;

use core::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

use ahash::{HashMap, HashMapExt};
use crossbeam_utils::CachePadded;
use parking_lot::RwLock;
use tracing::debug;

pub(crate) type EntryMap = HashMap<String, Arc<CacheEntry>>;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<K: Hash + ?Sized, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// The lock-guarded storage of one shard.
///
/// This is the part of a shard its janitor thread holds on to; the janitor
/// itself lives in [`Shard`] so that dropping the shard stops the thread.
pub(crate) struct ShardData {
  pub(crate) index: usize,
  pub(crate) map: RwLock<EntryMap>,
  metrics: Arc<Metrics>,
}

impl ShardData {
  fn new(index: usize, metrics: Arc<Metrics>) -> Self {
    Self {
      index,
      map: RwLock::new(HashMap::new()),
      metrics,
    }
  }

  /// Looks up a live entry, optionally sliding its expiry forward.
  ///
  /// An expired entry is reported as missing but left in place for the sweep.
  pub(crate) fn get(&self, key: &str, touch: bool) -> Option<Value> {
    let guard = self.map.read();
    match guard.get(key) {
      Some(entry) if !entry.is_expired() => {
        if touch {
          entry.touch();
        }
        Metrics::incr(&self.metrics.hits);
        Some(entry.value())
      }
      _ => {
        Metrics::incr(&self.metrics.misses);
        None
      }
    }
  }

  /// Returns the stored entry, expired or not.
  pub(crate) fn entry(&self, key: &str) -> Option<Arc<CacheEntry>> {
    self.map.read().get(key).cloned()
  }

  /// Unconditionally replaces whatever is stored under `key`.
  ///
  /// The replaced entry's removal callback is not run.
  pub(crate) fn insert(&self, key: String, entry: CacheEntry) {
    let mut guard = self.map.write();
    self.insert_locked(&mut guard, key, entry);
  }

  /// Same as [`insert`](Self::insert) for callers already holding the write lock.
  pub(crate) fn insert_locked(&self, map: &mut EntryMap, key: String, entry: CacheEntry) {
    map.insert(key, Arc::new(entry));
    Metrics::incr(&self.metrics.inserts);
  }

  /// Removes `key`, running its removal callback before the write lock is
  /// released. Returns `true` if an entry was present.
  pub(crate) fn remove(&self, key: &str) -> bool {
    let mut guard = self.map.write();
    match guard.remove(key) {
      Some(entry) => {
        entry.notify_removed(key, RemovalCause::Removed);
        Metrics::incr(&self.metrics.removals);
        true
      }
      None => false,
    }
  }

  pub(crate) fn has(&self, key: &str) -> bool {
    self
      .map
      .read()
      .get(key)
      .is_some_and(|entry| !entry.is_expired())
  }

  /// Discards every entry without running any removal callback.
  pub(crate) fn flush(&self) -> usize {
    let mut guard = self.map.write();
    let discarded = guard.len();
    guard.clear();
    Metrics::add(&self.metrics.flushed, discarded as u64);
    discarded
  }

  /// Removes every expired entry, running each one's removal callback.
  ///
  /// The write lock is held for the whole scan.
  pub(crate) fn sweep(&self) -> usize {
    let mut guard = self.map.write();
    let before = guard.len();
    guard.retain(|key, entry| {
      if entry.is_expired() {
        entry.notify_removed(key, RemovalCause::Expired);
        false
      } else {
        true
      }
    });
    let removed = before - guard.len();
    Metrics::add(&self.metrics.evicted_by_sweep, removed as u64);
    removed
  }

  pub(crate) fn expiry(&self, key: &str) -> Option<Instant> {
    self.map.read().get(key).and_then(|entry| entry.expires_at())
  }

  pub(crate) fn item(&self, key: &str) -> Option<Item> {
    self.map.read().get(key).map(|entry| entry.to_item())
  }

  /// Copies every live entry of this shard into `out`.
  pub(crate) fn collect_live(&self, out: &mut HashMap<String, Value>) {
    let guard = self.map.read();
    for (key, entry) in guard.iter() {
      if !entry.is_expired() {
        out.insert(key.clone(), entry.value());
      }
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.map.read().len()
  }
}

/// One partition of the map: its storage plus the janitor sweeping it.
pub(crate) struct Shard {
  data: Arc<ShardData>,
  janitor: Janitor,
}

impl Shard {
  fn new(index: usize, metrics: Arc<Metrics>, config: &CacheConfig) -> Result<Self, BuildError> {
    let data = Arc::new(ShardData::new(index, metrics));
    let janitor = Janitor::spawn(Arc::clone(&data), config.cleanup_interval)
      .map_err(|source| BuildError::SpawnJanitor { shard: index, source })?;
    Ok(Self { data, janitor })
  }

  /// Stops this shard's janitor. Calling it again is a no-op.
  pub(crate) fn close(&self) -> bool {
    self.janitor.stop()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.janitor.is_stopped()
  }
}

impl Deref for Shard {
  type Target = ShardData;

  fn deref(&self) -> &Self::Target {
    &self.data
  }
}

/// A store that is partitioned into multiple, independently locked shards.
///
/// This design allows for high concurrency by ensuring that operations on
/// different keys are unlikely to contend for the same lock.
pub(crate) struct ShardedStore<H> {
  pub(crate) shards: Box<[CachePadded<Shard>]>,
  pub(crate) hasher: H,
}

impl<H> fmt::Debug for ShardedStore<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<H: BuildHasher> ShardedStore<H> {
  /// Creates the shards and starts one janitor per shard.
  ///
  /// If a janitor fails to start, the shards created so far are dropped,
  /// which stops their janitors again.
  pub(crate) fn new(
    config: &CacheConfig,
    hasher: H,
    metrics: &Arc<Metrics>,
  ) -> Result<Self, BuildError> {
    let mut shards = Vec::with_capacity(config.shard_count);
    for index in 0..config.shard_count {
      let shard = Shard::new(index, Arc::clone(metrics), config)?;
      shards.push(CachePadded::new(shard));
    }
    debug!(shards = config.shard_count, "sharded store started");

    Ok(Self {
      shards: shards.into_boxed_slice(),
      hasher,
    })
  }

  /// Maps a key to its shard. Stable for the lifetime of the store.
  #[inline]
  pub(crate) fn get_shard_index(&self, key: &str) -> usize {
    let hash = hash_key(&self.hasher, key);
    // Safe because the builder rejects a shard count of zero.
    (hash % self.shards.len() as u64) as usize
  }

  #[inline]
  pub(crate) fn get_shard(&self, key: &str) -> &Shard {
    &self.shards[self.get_shard_index(key)]
  }
}

impl<H> ShardedStore<H> {
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &Shard> {
    self.shards.iter().map(|padded| &**padded)
  }

  /// Stops every janitor. Returns `false` if they were all already stopped.
  pub(crate) fn close(&self) -> bool {
    let mut closed_any = false;
    for shard in self.iter_shards() {
      closed_any |= shard.close();
    }
    if closed_any {
      debug!(shards = self.shards.len(), "sharded store closed");
    }
    closed_any
  }
}
