//! # Adapters Layer
//!
//! - `memory_store` - In-memory `WatchStore` for tests and single-process use
//! - `indices` - LRU-backed derived indices kept in step with persistence

pub mod indices;
pub mod memory_store;
