//! Builds a map from a JSON configuration. Missing fields take their defaults.
//!
//! Run with `cargo run -p fibre_ttlmap --features serde --example config_from_json`.

use fibre_ttlmap::{CacheBuilder, CacheConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let raw = r#"{
    "shard_count": 8,
    "default_ttl": { "secs": 30, "nanos": 0 },
    "cleanup_interval": { "secs": 5, "nanos": 0 }
  }"#;

  let config: CacheConfig = serde_json::from_str(raw)?;
  println!("{config:#?}");

  let cache = CacheBuilder::from_config(config).build()?;
  cache.set("session:42", String::from("alice"));
  println!("stored {} entries over {} shards", cache.len(), cache.shard_count());

  println!("{}", serde_json::to_string_pretty(cache.config())?);
  cache.close();
  Ok(())
}
