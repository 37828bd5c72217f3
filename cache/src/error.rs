use std::io;

use thiserror::Error;

/// Errors that can occur when building a map.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The map was configured with zero shards, which is not allowed.
  #[error("shard count cannot be zero")]
  ZeroShards,
  /// A zero cleanup interval would make every janitor spin.
  #[error("cleanup interval cannot be zero")]
  ZeroCleanupInterval,
  /// The OS refused to start a shard's janitor thread.
  #[error("failed to spawn janitor thread for shard {shard}: {source}")]
  SpawnJanitor {
    shard: usize,
    #[source]
    source: io::Error,
  },
}

/// Errors returned by [`Cache::fetch`](crate::Cache::fetch).
#[derive(Debug, Error)]
pub enum FetchError<E> {
  /// The stored value is not of the type the caller asked for. The source
  /// function was not invoked and the map is unchanged.
  #[error("cached value has type `{found}`, expected `{expected}`")]
  TypeMismatch {
    expected: &'static str,
    found: &'static str,
  },
  /// The source function reported a failure. Nothing was written.
  #[error("source function failed: {0}")]
  Source(E),
}

impl<E> FetchError<E> {
  /// Returns `true` for [`FetchError::TypeMismatch`].
  pub fn is_type_mismatch(&self) -> bool {
    matches!(self, FetchError::TypeMismatch { .. })
  }

  /// Returns the source error, if this is one.
  pub fn into_source(self) -> Option<E> {
    match self {
      FetchError::Source(err) => Some(err),
      FetchError::TypeMismatch { .. } => None,
    }
  }
}
