//! In-memory [`WatchStore`].
//!
//! Production nodes use the RocksDB adapter in node-runtime.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::ports::outbound::{KVStoreError, WatchStore};

#[derive(Debug, Default)]
pub struct InMemoryWatchStore {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryWatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of every entry, for convergence checks between two stores.
    pub fn dump(&self) -> HashMap<Vec<u8>, Vec<u8>> {
        self.data.read().clone()
    }
}

impl WatchStore for InMemoryWatchStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }
}
