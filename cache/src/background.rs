use crate::handles::Cache;
use crate::metrics::Metrics;

use std::any::Any;
use std::fmt::{self, Display};
use std::hash::BuildHasher;

use tracing::{trace, warn};

/// What a call to [`Cache::background_update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
  /// The updater ran and its value was stored.
  Updated,
  /// The updater ran and failed. The stored value, if any, is unchanged.
  Failed,
  /// Another update already held the key; nothing ran.
  Skipped,
}

impl fmt::Display for UpdateOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UpdateOutcome::Updated => write!(f, "updated"),
      UpdateOutcome::Failed => write!(f, "failed"),
      UpdateOutcome::Skipped => write!(f, "skipped"),
    }
  }
}

impl<H: BuildHasher> Cache<H> {
  /// Regenerates `key` with `updater` unless an update of the same key is
  /// already running against this map's [`KeyLock`](crate::KeyLock).
  ///
  /// The check never blocks: a busy key returns [`UpdateOutcome::Skipped`]
  /// straight away. Otherwise `updater` runs on the calling thread and an
  /// `Ok` value is stored with the default TTL. The key is released when
  /// this returns, even if `updater` panics.
  ///
  /// Spawn a thread around the call to run it truly in the background.
  pub fn background_update<T, E, F>(&self, key: &str, updater: F) -> UpdateOutcome
  where
    T: Any + Send + Sync,
    E: Display,
    F: FnOnce() -> Result<T, E>,
  {
    let metrics = &self.shared.metrics;
    let Some(_owned) = self.shared.key_lock.try_lock(key) else {
      Metrics::incr(&metrics.background_skipped);
      trace!(key, "background update skipped, key is busy");
      return UpdateOutcome::Skipped;
    };

    Metrics::incr(&metrics.background_updates);
    match updater() {
      Ok(value) => {
        self.set(key, value);
        UpdateOutcome::Updated
      }
      Err(err) => {
        Metrics::incr(&metrics.source_failures);
        warn!(key, error = %err, "background update failed");
        UpdateOutcome::Failed
      }
    }
  }
}
