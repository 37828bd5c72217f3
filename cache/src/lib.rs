//! An in-process, sharded key/value map with expiring entries.
//!
//! # Features
//! - **Sharded locking**: keys are spread over independently locked shards.
//! - **Two expiry clocks**: a sliding TTL that reads can push forward, and an
//!   absolute max lifetime that nothing can.
//! - **Background sweep**: one janitor thread per shard removes expired
//!   entries and fires their removal callbacks.
//! - **Stale-while-revalidate**: [`Cache::fetch`] regenerates an expired value
//!   once while other callers keep getting the stale one.
//! - **Coalesced updates**: [`Cache::background_update`] runs at most one
//!   updater per key, coordinated through a [`KeyLock`].
//! - **Observability**: [`Cache::metrics`] exposes hit, load and sweep counters,
//!   and lifecycle events are logged through `tracing`.

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod error;
pub mod handles;
pub mod keylock;
pub mod listener;
pub mod metrics;
pub mod value;

// Internal, crate-only modules
mod background;
mod entry;
mod fetch;
mod shared;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use background::UpdateOutcome;
pub use builder::CacheBuilder;
pub use config::CacheConfig;
pub use entry::Item;
pub use error::{BuildError, FetchError};
pub use handles::Cache;
pub use keylock::{KeyLock, KeyLockGuard};
pub use listener::{RemovalCallback, RemovalCause};
pub use metrics::MetricsSnapshot;
pub use value::Value;
