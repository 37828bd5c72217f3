mod common;

use common::build_quiet_cache;
use fibre_ttlmap::{CacheBuilder, RemovalCause};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_remove_fires_callback_once_and_synchronously() {
  let cache = build_quiet_cache(Duration::from_secs(60));
  let seen = Arc::new(Mutex::new(Vec::new()));

  let seen_clone = seen.clone();
  cache.set_with_callback("k", 42_i32, None, move |key, value, cause| {
    seen_clone
      .lock()
      .unwrap()
      .push((key.to_owned(), *value.downcast_ref::<i32>().unwrap(), cause));
  });

  assert!(cache.remove("k"));
  // Observed before remove() returned.
  assert_eq!(
    *seen.lock().unwrap(),
    vec![("k".to_owned(), 42, RemovalCause::Removed)]
  );

  assert!(!cache.remove("k"));
  assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_flush_bypasses_callbacks() {
  let cache = build_quiet_cache(Duration::from_secs(60));
  let calls = Arc::new(AtomicUsize::new(0));
  for i in 0..5 {
    let calls = calls.clone();
    cache.set_with_callback(format!("k{i}"), i, None, move |_, _, _| {
      calls.fetch_add(1, Ordering::SeqCst);
    });
  }

  assert_eq!(cache.flush(), 5);
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_overwrite_does_not_fire_callback() {
  let cache = build_quiet_cache(Duration::from_secs(60));
  let calls = Arc::new(AtomicUsize::new(0));
  let calls_clone = calls.clone();
  cache.set_with_callback("k", 1_i32, None, move |_, _, _| {
    calls_clone.fetch_add(1, Ordering::SeqCst);
  });

  cache.set("k", 2_i32);
  assert!(cache.remove("k"));
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_sweep_fires_expired_callback() {
  let cache = build_quiet_cache(Duration::from_secs(60));
  let causes = Arc::new(Mutex::new(Vec::new()));

  let causes_clone = causes.clone();
  cache.set_with_callback(
    "short",
    1_i32,
    Some(Duration::from_millis(20)),
    move |key, _, cause| {
      causes_clone.lock().unwrap().push((key.to_owned(), cause));
    },
  );
  cache.set("long", 2_i32);

  thread::sleep(Duration::from_millis(40));
  assert_eq!(cache.sweep(), 1);
  assert_eq!(cache.sweep(), 0);
  assert_eq!(
    *causes.lock().unwrap(),
    vec![("short".to_owned(), RemovalCause::Expired)]
  );
  assert!(cache.has("long"));
}

#[test]
fn test_janitor_fires_expired_callback() {
  let cache = CacheBuilder::new()
    .shards(1)
    .cleanup_interval(Duration::from_millis(10))
    .build()
    .unwrap();
  let calls = Arc::new(AtomicUsize::new(0));

  let calls_clone = calls.clone();
  cache.set_with_callback(
    "k",
    1_i32,
    Some(Duration::from_millis(20)),
    move |_, _, cause| {
      assert_eq!(cause, RemovalCause::Expired);
      calls_clone.fetch_add(1, Ordering::SeqCst);
    },
  );

  thread::sleep(Duration::from_millis(150));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert!(cache.is_empty());
}

#[test]
fn test_panicking_callback_does_not_stop_janitor() {
  common::init_tracing();
  let cache = CacheBuilder::new()
    .shards(1)
    .cleanup_interval(Duration::from_millis(10))
    .build()
    .unwrap();

  cache.set_with_callback(
    "bad",
    1_i32,
    Some(Duration::from_millis(5)),
    |_, _, _| panic!("callback failed"),
  );
  thread::sleep(Duration::from_millis(100));
  assert_eq!(cache.len(), 0, "the entry is removed even though its callback panicked");

  // The same janitor still sweeps later entries.
  cache.set_with_ttl("next", 2_i32, Duration::from_millis(5));
  thread::sleep(Duration::from_millis(200));
  assert_eq!(cache.len(), 0);
  assert!(!cache.is_closed());
  assert_eq!(cache.metrics().evicted_by_sweep, 2);
}

#[test]
fn test_panicking_callback_on_remove_is_contained() {
  let cache = build_quiet_cache(Duration::from_secs(60));
  cache.set_with_callback("k", 1_i32, None, |_, _, _| panic!("callback failed"));

  assert!(cache.remove("k"));
  assert!(!cache.has("k"));
  assert!(!cache.remove("k"));
}
