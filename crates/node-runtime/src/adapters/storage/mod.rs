//! # Production Storage Adapters
//!
//! Enable the `rocksdb` feature to back the query store with RocksDB:
//!
//! ```toml
//! node-runtime = { path = "...", features = ["rocksdb"] }
//! ```
//!
//! Without it the node runs on the in-memory store.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbWatchStore};

pub use qc_18_fast_query::InMemoryWatchStore;
