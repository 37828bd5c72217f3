//! Serves an expired price while one caller refreshes it, and coalesces
//! concurrent background updates of the same key.
//!
//! Run with `RUST_LOG=debug cargo run -p fibre_ttlmap --example stale_while_revalidate`.

use fibre_ttlmap::{CacheBuilder, UpdateOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cache = CacheBuilder::new()
    .shards(4)
    .default_ttl(Duration::from_millis(200))
    .cleanup_interval(Duration::from_secs(1))
    .build()
    .expect("valid configuration");

  let upstream_calls = Arc::new(AtomicU64::new(0));
  let load_price = {
    let upstream_calls = upstream_calls.clone();
    move |key: &str| {
      let n = upstream_calls.fetch_add(1, Ordering::SeqCst) + 1;
      thread::sleep(Duration::from_millis(100));
      Ok::<_, String>(format!("{key} @ {}", 100 + n))
    }
  };

  let price = cache.fetch("ACME", load_price.clone()).unwrap();
  println!("first fetch: {price}");

  thread::sleep(Duration::from_millis(250));
  println!("entry expired, has = {}", cache.has("ACME"));

  // One thread refreshes, the others get the stale value immediately.
  let readers: Vec<_> = (0..4)
    .map(|i| {
      let cache = cache.clone();
      let load_price = load_price.clone();
      thread::spawn(move || {
        let price = cache.fetch("ACME", load_price).unwrap();
        println!("reader {i}: {price}");
      })
    })
    .collect();
  for reader in readers {
    reader.join().unwrap();
  }
  println!("after refresh: {}", cache.fetch("ACME", load_price).unwrap());

  // Only one of these updaters runs.
  let updaters: Vec<_> = (0..4)
    .map(|_| {
      let cache = cache.clone();
      thread::spawn(move || {
        cache.background_update("ACME", || {
          thread::sleep(Duration::from_millis(50));
          Ok::<_, String>(String::from("ACME @ pushed"))
        })
      })
    })
    .collect();
  let updated = updaters
    .into_iter()
    .map(|h| h.join().unwrap())
    .filter(|outcome| *outcome == UpdateOutcome::Updated)
    .count();
  println!("background updates that ran: {updated}");

  println!("upstream calls: {}", upstream_calls.load(Ordering::SeqCst));
  println!("{:#?}", cache.metrics());
  cache.close();
}
