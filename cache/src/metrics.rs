use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the map.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Throughput ---
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) removals: CachePadded<AtomicU64>,

  // --- Eviction Stats ---
  pub(crate) evicted_by_sweep: CachePadded<AtomicU64>,
  pub(crate) flushed: CachePadded<AtomicU64>,

  // --- Refresh protocols ---
  pub(crate) source_loads: CachePadded<AtomicU64>,
  pub(crate) stale_served: CachePadded<AtomicU64>,
  pub(crate) background_updates: CachePadded<AtomicU64>,
  pub(crate) background_skipped: CachePadded<AtomicU64>,
  pub(crate) source_failures: CachePadded<AtomicU64>,

  created_at: Instant,
}

// Manual implementation of Default to handle the non-default `Instant`.
impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      evicted_by_sweep: CachePadded::new(AtomicU64::new(0)),
      flushed: CachePadded::new(AtomicU64::new(0)),
      source_loads: CachePadded::new(AtomicU64::new(0)),
      stale_served: CachePadded::new(AtomicU64::new(0)),
      background_updates: CachePadded::new(AtomicU64::new(0)),
      background_skipped: CachePadded::new(AtomicU64::new(0)),
      source_failures: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn add(counter: &AtomicU64, n: u64) {
    if n > 0 {
      counter.fetch_add(n, Ordering::Relaxed);
    }
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      inserts: self.inserts.load(Ordering::Relaxed),
      removals: self.removals.load(Ordering::Relaxed),
      evicted_by_sweep: self.evicted_by_sweep.load(Ordering::Relaxed),
      flushed: self.flushed.load(Ordering::Relaxed),
      source_loads: self.source_loads.load(Ordering::Relaxed),
      stale_served: self.stale_served.load(Ordering::Relaxed),
      background_updates: self.background_updates.load(Ordering::Relaxed),
      background_skipped: self.background_skipped.load(Ordering::Relaxed),
      source_failures: self.source_failures.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the map's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups (`get`, `touch_get`, fresh `fetch` hits) that found a live entry.
  pub hits: u64,
  /// Lookups that found nothing, or only an expired entry.
  pub misses: u64,
  /// The hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Entries written by `set`, `mset`, `fetch` or `background_update`.
  pub inserts: u64,
  /// Entries removed by an explicit `remove`.
  pub removals: u64,
  /// Expired entries removed by a sweep.
  pub evicted_by_sweep: u64,
  /// Entries discarded by `flush`.
  pub flushed: u64,
  /// Invocations of a `fetch` source function.
  pub source_loads: u64,
  /// `fetch` calls that returned an expired value while another caller refreshed it.
  pub stale_served: u64,
  /// Background updater bodies that ran.
  pub background_updates: u64,
  /// Background update calls that returned without work because the key was held.
  pub background_skipped: u64,
  /// Failed `fetch` sources, on both the miss and the stale-refresh path,
  /// plus failed `background_update` updaters.
  pub source_failures: u64,
  /// The number of seconds the map has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("inserts", &self.inserts)
      .field("removals", &self.removals)
      .field("evicted_by_sweep", &self.evicted_by_sweep)
      .field("flushed", &self.flushed)
      .field("source_loads", &self.source_loads)
      .field("stale_served", &self.stale_served)
      .field("background_updates", &self.background_updates)
      .field("background_skipped", &self.background_skipped)
      .field("source_failures", &self.source_failures)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
