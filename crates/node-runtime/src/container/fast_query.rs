//! # Fast-Query Container
//!
//! Owns the fast-query subsystem for the lifetime of the node: opens the
//! store backend, builds the producer and the querier, and flushes pending
//! epochs on shutdown.
//!
//! The block executor takes the producer through [`FastQueryContainer::watcher`];
//! RPC handlers hold clones of [`FastQueryContainer::querier`].

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use qc_18_fast_query::{
    FastQuery, InMemoryWatchStore, KVStoreError, Querier, WatchStore, WatcherError, WatcherTx,
};
use thiserror::Error;
use tracing::{info, instrument};

use crate::container::config::{ConfigError, NodeConfig, StorageBackend, StorageConfig};

/// Failures while assembling the subsystem.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open query store: {0}")]
    Store(#[from] KVStoreError),

    #[error(transparent)]
    FastQuery(#[from] WatcherError),

    #[error("Storage backend {0:?} is not compiled in")]
    BackendUnavailable(StorageBackend),
}

type Stores = (Arc<dyn WatchStore>, Option<Arc<dyn WatchStore>>);

pub struct FastQueryContainer {
    config: NodeConfig,
    watcher: Mutex<WatcherTx>,
    querier: Arc<Querier>,
}

impl FastQueryContainer {
    /// Validates `config`, opens the stores and starts the persistence worker.
    #[instrument(skip_all, name = "fast_query_container")]
    pub fn new(config: NodeConfig) -> Result<Self, ContainerError> {
        config.validate()?;
        let (store, bloom_store) = open_stores(&config.storage)?;
        let FastQuery { watcher, querier } =
            FastQuery::build(config.fast_query.clone(), store, bloom_store)?;

        info!(
            "Fast-query container ready ({:?} backend at {})",
            config.storage.backend,
            config.storage.data_dir.display()
        );
        Ok(Self {
            config,
            watcher: Mutex::new(watcher),
            querier,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Exclusive access to the producer. Hold it for one block at a time.
    pub fn watcher(&self) -> MutexGuard<'_, WatcherTx> {
        self.watcher.lock()
    }

    pub fn querier(&self) -> Arc<Querier> {
        Arc::clone(&self.querier)
    }

    /// Stops the worker and flushes every pending epoch. Blocks; returns the
    /// number of epochs flushed by the final drain.
    pub fn shutdown(&self) -> usize {
        let flushed = self.watcher.lock().close();
        info!("Fast-query container stopped ({} epochs flushed)", flushed);
        flushed
    }
}

fn open_stores(storage: &StorageConfig) -> Result<Stores, ContainerError> {
    match storage.backend {
        StorageBackend::Memory => Ok((
            Arc::new(InMemoryWatchStore::new()),
            Some(Arc::new(InMemoryWatchStore::new())),
        )),
        StorageBackend::RocksDb => open_rocksdb(storage),
    }
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(storage: &StorageConfig) -> Result<Stores, ContainerError> {
    use crate::adapters::storage::{RocksDbConfig, RocksDbWatchStore};

    let watch = RocksDbWatchStore::open(RocksDbConfig::at(storage.watch_db_path()))?;
    let bloom = RocksDbWatchStore::open(RocksDbConfig::at(storage.bloom_db_path()))?;
    Ok((Arc::new(watch), Some(Arc::new(bloom))))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(_storage: &StorageConfig) -> Result<Stores, ContainerError> {
    Err(ContainerError::BackendUnavailable(StorageBackend::RocksDb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_18_fast_query::FastQueryApi;
    use shared_types::{BlockHeader, Bloom};

    fn memory_config(async_commit: bool) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.fast_query.enabled = true;
        config.fast_query.async_commit = async_commit;
        config
    }

    #[test]
    fn test_container_serves_committed_blocks() {
        let container = FastQueryContainer::new(memory_config(true)).unwrap();
        {
            let mut watcher = container.watcher();
            watcher.new_height(7, [7u8; 32], BlockHeader::default());
            watcher.save_block(Bloom::default());
            watcher.commit().unwrap();
        }
        let querier = container.querier();
        assert_eq!(querier.get_latest_block_number().unwrap(), 7);

        container.shutdown();
        assert_eq!(querier.get_latest_block_number().unwrap(), 7);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = memory_config(false);
        config.fast_query.lru_size = 0;
        assert!(matches!(
            FastQueryContainer::new(config),
            Err(ContainerError::Config(_))
        ));
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_backend_requires_feature() {
        let mut config = memory_config(false);
        config.storage.backend = StorageBackend::RocksDb;
        assert!(matches!(
            FastQueryContainer::new(config),
            Err(ContainerError::BackendUnavailable(StorageBackend::RocksDb))
        ));
    }
}
