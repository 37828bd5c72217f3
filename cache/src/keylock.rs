use std::collections::HashSet;
use std::fmt;

use parking_lot::{Condvar, Mutex};

/// A registry of string keys that are currently "owned" by some caller.
///
/// `KeyLock` backs [`Cache::background_update`](crate::Cache::background_update):
/// at most one owner exists per key at a time. Each cache gets its own
/// registry by default; pass the same `Arc<KeyLock>` to several builders to
/// make them coordinate on shared key strings.
///
/// # Example
///
/// ```
/// use fibre_ttlmap::KeyLock;
///
/// let locks = KeyLock::new();
/// let guard = locks.try_lock("user:1").expect("nobody holds it yet");
/// assert!(locks.try_lock("user:1").is_none());
/// drop(guard);
/// assert!(!locks.is_locked("user:1"));
/// ```
#[derive(Default)]
pub struct KeyLock {
  held: Mutex<HashSet<String>>,
  released: Condvar,
}

impl fmt::Debug for KeyLock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("KeyLock")
      .field("held", &self.held.lock().len())
      .finish()
  }
}

impl KeyLock {
  pub fn new() -> Self {
    Self::default()
  }

  /// Takes ownership of `key` if nobody holds it. Never blocks on the key.
  ///
  /// Ownership is released when the returned guard is dropped.
  pub fn try_lock<'a>(&'a self, key: &str) -> Option<KeyLockGuard<'a>> {
    let mut held = self.held.lock();
    if held.contains(key) {
      return None;
    }
    held.insert(key.to_owned());
    Some(KeyLockGuard {
      lock: self,
      key: key.to_owned(),
    })
  }

  /// Returns `true` if some caller currently owns `key`.
  pub fn is_locked(&self, key: &str) -> bool {
    self.held.lock().contains(key)
  }

  /// Blocks until `key` is not owned by anyone.
  ///
  /// This does not acquire the key; a subsequent `try_lock` can still lose
  /// the race to another caller.
  pub fn wait(&self, key: &str) {
    let mut held = self.held.lock();
    while held.contains(key) {
      self.released.wait(&mut held);
    }
  }

  fn unlock(&self, key: &str) {
    let mut held = self.held.lock();
    held.remove(key);
    drop(held);
    self.released.notify_all();
  }
}

/// Ownership of one key in a [`KeyLock`]. Released on drop.
#[must_use = "the key is released as soon as the guard is dropped"]
pub struct KeyLockGuard<'a> {
  lock: &'a KeyLock,
  key: String,
}

impl KeyLockGuard<'_> {
  pub fn key(&self) -> &str {
    &self.key
  }
}

impl fmt::Debug for KeyLockGuard<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("KeyLockGuard").field("key", &self.key).finish()
  }
}

impl Drop for KeyLockGuard<'_> {
  fn drop(&mut self) {
    self.lock.unlock(&self.key);
  }
}
