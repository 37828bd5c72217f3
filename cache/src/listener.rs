use crate::value::Value;

use std::fmt;

/// Describes why an entry was physically removed from its shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
  /// The entry was removed by an explicit `remove` call.
  Removed,
  /// A sweep found the entry expired (TTL elapsed or max lifetime reached).
  Expired,
}

impl fmt::Display for RemovalCause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RemovalCause::Removed => write!(f, "explicitly removed"),
      RemovalCause::Expired => write!(f, "swept after expiry (TTL/max lifetime)"),
    }
  }
}

/// A one-shot callback attached to a single entry.
///
/// It runs synchronously on the thread performing the removal, while that
/// shard's write lock is held, so it must not call back into the same map.
/// It is never run for a `flush` or when the entry is overwritten by `set`.
/// A panic inside the callback is caught and logged; the entry is removed
/// regardless.
pub type RemovalCallback = Box<dyn FnOnce(&str, &Value, RemovalCause) + Send>;
