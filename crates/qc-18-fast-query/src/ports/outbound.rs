//! # Outbound Ports (Driven Ports)
//!
//! The key-value store the fast-query subsystem persists into.
//!
//! Production: `RocksDbWatchStore` (node-runtime/adapters/storage/rocksdb_adapter.rs)
//! Testing: `InMemoryWatchStore` (adapters/memory_store.rs)

use thiserror::Error;

/// Key-value store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    /// The store could not be opened.
    #[error("KV store unavailable: {message}")]
    Unavailable { message: String },
}

/// Minimal store contract used by the persistence worker and the querier.
///
/// No transactions are assumed. Writes are serialized by the single
/// persistence worker; the only other writers are the direct RPC-db puts.
pub trait WatchStore: Send + Sync {
    /// `Ok(None)` when the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Deleting an absent key succeeds.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    fn has(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }
}
