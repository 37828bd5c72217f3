mod common;

use common::build_quiet_cache;
use fibre_ttlmap::CacheBuilder;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_entry_expires_after_ttl() {
  let cache = build_quiet_cache(Duration::from_millis(50));
  cache.set("k", 1_i32);
  assert!(cache.has("k"));

  thread::sleep(Duration::from_millis(70));
  assert!(!cache.has("k"));
  assert!(cache.get("k").is_none());
  // Expired but not swept: still stored and its expiry is still reported.
  assert_eq!(cache.len(), 1);
  assert!(cache.get_expiry("k").unwrap() <= Instant::now());
}

#[test]
fn test_explicit_ttl_overrides_default() {
  let cache = build_quiet_cache(Duration::from_secs(3600));
  cache.set_with_ttl("short", 1_i32, Duration::from_millis(50));
  cache.set("long", 2_i32);

  thread::sleep(Duration::from_millis(70));
  assert!(!cache.has("short"));
  assert!(cache.has("long"));
}

#[test]
fn test_touching_read_extends_expiry() {
  let cache = build_quiet_cache(Duration::from_millis(100));
  cache.set("k", 1_i32);

  // Keep touching past the first expiry.
  for _ in 0..4 {
    thread::sleep(Duration::from_millis(40));
    assert!(cache.get("k").is_some());
  }
  assert!(cache.has("k"));
}

#[test]
fn test_non_touching_read_does_not_extend_expiry() {
  let cache = build_quiet_cache(Duration::from_millis(80));
  cache.set("k", 1_i32);
  let expiry = cache.get_expiry("k");

  thread::sleep(Duration::from_millis(20));
  assert!(cache.touch_get("k", false).is_some());
  assert_eq!(cache.get_expiry("k"), expiry);

  thread::sleep(Duration::from_millis(80));
  assert!(cache.touch_get("k", false).is_none());
}

#[test]
fn test_max_lifetime_beats_ttl() {
  let cache = CacheBuilder::new()
    .default_ttl(Duration::from_secs(3600))
    .max_lifetime(Duration::from_millis(100))
    .cleanup_interval(Duration::from_secs(3600))
    .build()
    .unwrap();
  cache.set("k", 1_i32);

  let started = Instant::now();
  while started.elapsed() < Duration::from_millis(150) {
    cache.get("k");
    thread::sleep(Duration::from_millis(20));
  }
  assert!(!cache.has("k"), "touches must not extend past max lifetime");

  let item = cache.get_item("k").unwrap();
  assert!(item.deadline() <= Instant::now());
  assert!(item.is_expired());
}

#[test]
fn test_janitor_sweeps_expired_entries() {
  let cache = CacheBuilder::new()
    .shards(2)
    .default_ttl(Duration::from_millis(30))
    .cleanup_interval(Duration::from_millis(20))
    .build()
    .unwrap();
  for i in 0..10 {
    cache.set(format!("k{i}"), i);
  }
  cache.set_with_ttl("keep", 0_i32, Duration::from_secs(60));
  assert_eq!(cache.len(), 11);

  thread::sleep(Duration::from_millis(200));
  assert_eq!(cache.len(), 1);
  assert!(cache.has("keep"));
  assert_eq!(cache.metrics().evicted_by_sweep, 10);
}

#[test]
fn test_manual_sweep_after_close() {
  let cache = CacheBuilder::new()
    .default_ttl(Duration::from_millis(20))
    .cleanup_interval(Duration::from_millis(10))
    .build()
    .unwrap();
  cache.close();
  cache.set("k", 1_i32);

  thread::sleep(Duration::from_millis(60));
  assert_eq!(cache.len(), 1, "no janitor runs after close");
  assert_eq!(cache.sweep(), 1);
  assert!(cache.is_empty());
}
