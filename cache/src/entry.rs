use crate::listener::{RemovalCallback, RemovalCause};
use crate::time::{self, UNSET};
use crate::value::Value;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

/// A container for a value in the map, holding all necessary metadata.
pub(crate) struct CacheEntry {
  /// The user's value.
  value: Value,
  /// Sliding expiry window, re-applied on every touch.
  ttl: Duration,
  /// Absolute expiry in epoch nanoseconds. Never moved by a touch.
  deadline: u64,
  /// Sliding expiry in epoch nanoseconds. `UNSET` means already expired.
  pub(crate) expires_at: AtomicU64,
  /// Taken exactly once, by whichever path physically removes the entry.
  on_remove: Mutex<Option<RemovalCallback>>,
  /// Held by the single caller regenerating this entry in `fetch`.
  refreshing: AtomicBool,
}

impl fmt::Debug for CacheEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntry")
      .field("value", &self.value)
      .field("ttl", &self.ttl)
      .field("deadline", &self.deadline)
      .field("expires_at", &self.expires_at.load(Ordering::Relaxed))
      .field("refreshing", &self.refreshing.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

impl CacheEntry {
  /// Creates a new `CacheEntry` expiring `ttl` from now, and at the latest
  /// `max_lifetime` from now.
  pub(crate) fn new(
    value: Value,
    ttl: Duration,
    max_lifetime: Duration,
    on_remove: Option<RemovalCallback>,
  ) -> Self {
    let now = time::now_nanos();
    Self {
      value,
      ttl,
      deadline: time::nanos_after(now, max_lifetime),
      expires_at: AtomicU64::new(time::nanos_after(now, ttl)),
      on_remove: Mutex::new(on_remove),
      refreshing: AtomicBool::new(false),
    }
  }

  /// Returns a clone of the stored value.
  #[inline]
  pub(crate) fn value(&self) -> Value {
    self.value.clone()
  }

  #[inline]
  pub(crate) fn value_ref(&self) -> &Value {
    &self.value
  }

  /// Pushes the sliding expiry to `now + ttl`. The deadline is untouched.
  #[inline]
  pub(crate) fn touch(&self) {
    let expires_at = time::nanos_after(time::now_nanos(), self.ttl);
    self.expires_at.store(expires_at, Ordering::Relaxed);
  }

  /// Checks if the entry is expired by TTL or by max lifetime.
  #[inline]
  pub(crate) fn is_expired(&self) -> bool {
    is_expired_at(
      time::now_nanos(),
      self.expires_at.load(Ordering::Relaxed),
      self.deadline,
    )
  }

  pub(crate) fn expires_at(&self) -> Option<Instant> {
    match self.expires_at.load(Ordering::Relaxed) {
      UNSET => None,
      nanos => Some(time::nanos_to_instant(nanos)),
    }
  }

  /// Produces a detached copy of the entry's value and expiry metadata.
  pub(crate) fn to_item(&self) -> Item {
    Item {
      value: self.value(),
      ttl: self.ttl,
      deadline: self.deadline,
      expires_at: self.expires_at.load(Ordering::Relaxed),
    }
  }

  /// Attempts to become the single refresher of this entry without blocking.
  ///
  /// The flag is released when the returned guard is dropped.
  pub(crate) fn try_begin_refresh(&self) -> Option<RefreshGuard<'_>> {
    self
      .refreshing
      .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
      .ok()
      .map(|_| RefreshGuard { flag: &self.refreshing })
  }

  /// Runs the removal callback, if any. Subsequent calls are no-ops.
  ///
  /// A panicking callback is logged and contained, so the removal still
  /// completes and a sweeping janitor keeps running.
  pub(crate) fn notify_removed(&self, key: &str, cause: RemovalCause) {
    let callback = self.on_remove.lock().take();
    if let Some(callback) = callback {
      let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(key, &self.value, cause)));
      if outcome.is_err() {
        warn!(key, %cause, "removal callback panicked");
      }
    }
  }
}

#[inline]
fn is_expired_at(now: u64, expires_at: u64, deadline: u64) -> bool {
  expires_at == UNSET || now >= deadline || now >= expires_at
}

/// Releases an entry's refresh flag on drop.
pub(crate) struct RefreshGuard<'a> {
  flag: &'a AtomicBool,
}

impl Drop for RefreshGuard<'_> {
  fn drop(&mut self) {
    self.flag.store(false, Ordering::Release);
  }
}

/// A detached snapshot of a stored entry, returned by `Cache::get_item`.
///
/// Mutating an `Item` (for example with [`Item::touch`]) only changes the
/// copy; the live entry in the map is unaffected.
#[derive(Debug, Clone)]
pub struct Item {
  value: Value,
  ttl: Duration,
  deadline: u64,
  expires_at: u64,
}

impl Item {
  /// The cached value.
  pub fn value(&self) -> &Value {
    &self.value
  }

  /// The entry's sliding time-to-live.
  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// The absolute instant after which the entry is expired regardless of
  /// any touch.
  pub fn deadline(&self) -> Instant {
    time::nanos_to_instant(self.deadline)
  }

  /// The current sliding expiry, if set.
  pub fn expiry(&self) -> Option<Instant> {
    match self.expires_at {
      UNSET => None,
      nanos => Some(time::nanos_to_instant(nanos)),
    }
  }

  /// Extends this copy's expiry to `now + ttl`.
  pub fn touch(&mut self) {
    self.expires_at = time::nanos_after(time::now_nanos(), self.ttl);
  }

  /// Whether this copy is expired as of now.
  pub fn is_expired(&self) -> bool {
    is_expired_at(time::now_nanos(), self.expires_at, self.deadline)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use std::sync::Arc;
  use std::thread;

  const HOUR: Duration = Duration::from_secs(3600);

  #[test]
  fn test_fresh_entry_is_not_expired() {
    let entry = CacheEntry::new(Value::new(1_i32), HOUR, HOUR, None);
    assert!(!entry.is_expired());
    assert!(entry.expires_at().is_some());
  }

  #[test]
  fn test_zero_ttl_expires_immediately() {
    let entry = CacheEntry::new(Value::new(1_i32), Duration::ZERO, HOUR, None);
    assert!(entry.is_expired());
  }

  #[test]
  fn test_deadline_wins_over_touch() {
    let entry = CacheEntry::new(Value::new(1_i32), HOUR, Duration::from_millis(20), None);
    thread::sleep(Duration::from_millis(40));
    entry.touch();
    assert!(entry.is_expired(), "a touch must never extend past the deadline");
  }

  #[test]
  fn test_touch_moves_expiry_forward() {
    let entry = CacheEntry::new(Value::new(1_i32), Duration::from_millis(50), HOUR, None);
    let before = entry.expires_at().unwrap();
    thread::sleep(Duration::from_millis(5));
    entry.touch();
    assert!(entry.expires_at().unwrap() > before);
  }

  #[test]
  fn test_refresh_guard_is_exclusive_and_released_on_drop() {
    let entry = CacheEntry::new(Value::new(1_i32), HOUR, HOUR, None);
    let guard = entry.try_begin_refresh();
    assert!(guard.is_some());
    assert!(entry.try_begin_refresh().is_none());
    drop(guard);
    assert!(entry.try_begin_refresh().is_some());
  }

  #[test]
  fn test_removal_callback_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let callback: RemovalCallback = {
      let calls = calls.clone();
      Box::new(move |key, value, cause| {
        assert_eq!(key, "k");
        assert_eq!(value.downcast_ref::<i32>(), Some(&1));
        assert_eq!(cause, RemovalCause::Removed);
        calls.fetch_add(1, Ordering::SeqCst);
      })
    };
    let entry = CacheEntry::new(Value::new(1_i32), HOUR, HOUR, Some(callback));
    entry.notify_removed("k", RemovalCause::Removed);
    entry.notify_removed("k", RemovalCause::Removed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_panicking_callback_is_contained() {
    let callback: RemovalCallback = Box::new(|_, _, _| panic!("callback failed"));
    let entry = CacheEntry::new(Value::new(1_i32), HOUR, HOUR, Some(callback));
    entry.notify_removed("k", RemovalCause::Expired);
    // The slot was emptied, so a second removal does nothing.
    entry.notify_removed("k", RemovalCause::Expired);
  }

  #[test]
  fn test_item_is_detached_from_entry() {
    let entry = CacheEntry::new(Value::new(1_i32), Duration::from_millis(50), HOUR, None);
    let stored_expiry = entry.expires_at();
    let mut item = entry.to_item();
    thread::sleep(Duration::from_millis(5));
    item.touch();
    assert!(item.expiry() > stored_expiry);
    assert_eq!(entry.expires_at(), stored_expiry);
  }
}
