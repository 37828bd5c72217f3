//! Background tasks owned by the map. Currently only the per-shard janitor
//! that sweeps expired entries.

pub(crate) mod janitor;
