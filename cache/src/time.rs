use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for all time calculations in the map.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Sentinel stored in an atomic timestamp slot meaning "never set".
pub(crate) const UNSET: u64 = 0;

/// Converts an `Instant` into nanoseconds since the epoch.
///
/// Never returns `UNSET`: instants at or before the epoch map to `1`.
#[inline]
pub(crate) fn instant_to_nanos(instant: Instant) -> u64 {
  let nanos = instant.saturating_duration_since(*CACHE_EPOCH).as_nanos();
  u64::try_from(nanos).unwrap_or(u64::MAX).max(1)
}

/// Converts nanoseconds since the epoch back into an `Instant`.
#[inline]
pub(crate) fn nanos_to_instant(nanos: u64) -> Instant {
  *CACHE_EPOCH + Duration::from_nanos(nanos)
}

/// The current time as nanoseconds since the epoch.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  instant_to_nanos(Instant::now())
}

/// Durations are capped at ~100 years so converting back to an `Instant`
/// can never overflow.
const MAX_HORIZON: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + duration` in epoch nanoseconds, with `duration` capped at
/// `MAX_HORIZON`.
#[inline]
pub(crate) fn nanos_after(now: u64, duration: Duration) -> u64 {
  let delta = duration.min(MAX_HORIZON).as_nanos() as u64;
  now.saturating_add(delta)
}
