//! # Node Runtime Library
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! - `container/` - Configuration and the fast-query container
//! - `adapters/` - Store backends (RocksDB behind the `rocksdb` feature)

pub mod adapters;
pub mod container;

pub use container::{ContainerError, FastQueryContainer, NodeConfig};
