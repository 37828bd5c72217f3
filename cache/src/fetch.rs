use crate::entry::CacheEntry;
use crate::error::FetchError;
use crate::handles::Cache;
use crate::metrics::Metrics;
use crate::store::ShardData;
use crate::value::Value;

use std::any::{self, Any};
use std::fmt::Display;
use std::hash::BuildHasher;
use std::sync::Arc;

use tracing::{trace, warn};

impl<H: BuildHasher> Cache<H> {
  /// Returns the `T` stored under `key`, producing it with `source` when it
  /// is missing or expired.
  ///
  /// - A stored value of another type yields [`FetchError::TypeMismatch`]
  ///   and `source` is not called.
  /// - A live value is returned as is.
  /// - An expired value is regenerated by exactly one caller; concurrent
  ///   callers get the stale value back while that happens. If the refresh
  ///   fails, its caller gets [`FetchError::Source`] and the stale entry
  ///   stays in place.
  /// - A missing key is loaded under the shard's write lock, so concurrent
  ///   callers for it invoke `source` once and all observe its result.
  ///
  /// Values produced by `source` are stored with the default TTL.
  ///
  /// # Example
  ///
  /// ```
  /// use fibre_ttlmap::Cache;
  /// use std::convert::Infallible;
  ///
  /// let cache = Cache::builder().build().unwrap();
  /// let value = cache
  ///   .fetch("greeting", |_| Ok::<_, Infallible>(String::from("hello")))
  ///   .unwrap();
  /// assert_eq!(value.as_str(), "hello");
  ///
  /// // A second fetch is served from the map.
  /// let value = cache
  ///   .fetch("greeting", |_| Ok::<_, Infallible>(String::from("ignored")))
  ///   .unwrap();
  /// assert_eq!(value.as_str(), "hello");
  /// ```
  pub fn fetch<T, E, F>(&self, key: &str, source: F) -> Result<Arc<T>, FetchError<E>>
  where
    T: Any + Send + Sync,
    E: Display,
    F: FnOnce(&str) -> Result<T, E>,
  {
    let metrics = &self.shared.metrics;
    let shard = self.shared.store.get_shard(key);

    if let Some(entry) = shard.entry(key) {
      let stored = downcast_stored::<T, E>(entry.value_ref())?;
      if !entry.is_expired() {
        Metrics::incr(&metrics.hits);
        return Ok(stored);
      }

      return self.refresh_stale(shard, key, &entry, stored, source);
    }

    let mut guard = shard.map.write();
    // Another caller may have loaded it while we waited for the lock.
    if let Some(entry) = guard.get(key) {
      Metrics::incr(&metrics.hits);
      return downcast_stored::<T, E>(entry.value_ref());
    }

    Metrics::incr(&metrics.misses);
    let produced = Arc::new(self.call_source(key, source)?);
    let fresh = self.shared.new_entry(Value::from_arc(Arc::clone(&produced)), None, None);
    shard.insert_locked(&mut guard, key.to_owned(), fresh);
    Ok(produced)
  }

  /// Regenerates the expired `entry` if no other caller is already doing so,
  /// otherwise hands back `stale`.
  fn refresh_stale<T, E, F>(
    &self,
    shard: &ShardData,
    key: &str,
    entry: &Arc<CacheEntry>,
    stale: Arc<T>,
    source: F,
  ) -> Result<Arc<T>, FetchError<E>>
  where
    T: Any + Send + Sync,
    E: Display,
    F: FnOnce(&str) -> Result<T, E>,
  {
    let metrics = &self.shared.metrics;
    let Some(_refreshing) = entry.try_begin_refresh() else {
      Metrics::incr(&metrics.stale_served);
      trace!(key, "serving stale value while another caller refreshes");
      return Ok(stale);
    };

    // A refresh that finished between our read and taking the flag has
    // already replaced the entry.
    if let Some(current) = shard.entry(key) {
      if !Arc::ptr_eq(&current, entry) && !current.is_expired() {
        Metrics::incr(&metrics.hits);
        return downcast_stored::<T, E>(current.value_ref());
      }
    }

    Metrics::incr(&metrics.misses);
    let produced = Arc::new(self.call_source(key, source)?);
    let fresh = self.shared.new_entry(Value::from_arc(Arc::clone(&produced)), None, None);
    shard.insert(key.to_owned(), fresh);
    Ok(produced)
  }

  fn call_source<T, E, F>(&self, key: &str, source: F) -> Result<T, FetchError<E>>
  where
    E: Display,
    F: FnOnce(&str) -> Result<T, E>,
  {
    let metrics = &self.shared.metrics;
    Metrics::incr(&metrics.source_loads);
    source(key).map_err(|err| {
      Metrics::incr(&metrics.source_failures);
      warn!(key, error = %err, "fetch source failed");
      FetchError::Source(err)
    })
  }
}

fn downcast_stored<T, E>(value: &Value) -> Result<Arc<T>, FetchError<E>>
where
  T: Any + Send + Sync,
{
  value.downcast::<T>().ok_or_else(|| FetchError::TypeMismatch {
    expected: any::type_name::<T>(),
    found: value.type_name(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::CacheBuilder;
  use std::convert::Infallible;
  use std::thread;
  use std::time::Duration;

  fn expired_cache() -> Cache {
    let cache = CacheBuilder::new()
      .shards(1)
      .cleanup_interval(Duration::from_secs(3600))
      .build()
      .unwrap();
    cache.set_with_ttl("k", 1_i32, Duration::from_millis(10));
    thread::sleep(Duration::from_millis(30));
    cache
  }

  #[test]
  fn test_refresh_skipped_when_entry_already_replaced() {
    let cache = expired_cache();
    let shard = cache.shared.store.get_shard("k");
    let stale_entry = shard.entry("k").unwrap();

    // Another caller finished its refresh after we read the stale entry.
    cache.set("k", 2_i32);

    let value = cache
      .refresh_stale(shard, "k", &stale_entry, Arc::new(1_i32), |_| -> Result<i32, Infallible> {
        panic!("an already refreshed entry must not be loaded again");
      })
      .unwrap();
    assert_eq!(*value, 2);
    assert_eq!(cache.metrics().source_loads, 0);
  }

  #[test]
  fn test_refresh_runs_when_entry_is_still_current() {
    let cache = expired_cache();
    let shard = cache.shared.store.get_shard("k");
    let stale_entry = shard.entry("k").unwrap();

    let value = cache
      .refresh_stale(shard, "k", &stale_entry, Arc::new(1_i32), |_| {
        Ok::<_, Infallible>(3_i32)
      })
      .unwrap();
    assert_eq!(*value, 3);
    assert_eq!(cache.metrics().source_loads, 1);
    assert!(!Arc::ptr_eq(&shard.entry("k").unwrap(), &stale_entry));
  }
}
