#![allow(dead_code)]

use std::hash::{BuildHasher, Hasher};
use std::time::Duration;

use fibre_ttlmap::{Cache, CacheBuilder};

// A custom hasher that allows us to control which shard a key is assigned to.
// It reads the decimal digits of the key as its hash and ignores everything
// else. For a 4-shard map:
// - "0" / "k0" -> shard 0
// - "1" / "k1" -> shard 1
// - "5" / "k5" -> shard 1 (5 % 4 = 1)
#[derive(Clone, Default)]
pub struct ShardControllingHasher;
impl BuildHasher for ShardControllingHasher {
  type Hasher = TestHasher;
  fn build_hasher(&self) -> Self::Hasher {
    TestHasher(0)
  }
}
pub struct TestHasher(u64);
impl Hasher for TestHasher {
  fn finish(&self) -> u64 {
    self.0
  }
  fn write(&mut self, bytes: &[u8]) {
    for byte in bytes.iter().filter(|b| b.is_ascii_digit()) {
      self.0 = self.0.wrapping_mul(10).wrapping_add(u64::from(byte - b'0'));
    }
  }
}

pub fn build_test_cache(shards: usize) -> Cache<ShardControllingHasher> {
  CacheBuilder::new()
    .shards(shards)
    .hasher(ShardControllingHasher)
    .build()
    .unwrap()
}

// A map whose janitors never run during a test, so only explicit sweeps
// remove entries.
pub fn build_quiet_cache(default_ttl: Duration) -> Cache {
  CacheBuilder::new()
    .shards(4)
    .default_ttl(default_ttl)
    .cleanup_interval(Duration::from_secs(3600))
    .build()
    .unwrap()
}

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}
