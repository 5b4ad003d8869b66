//! # Fast-Query Service
//!
//! Wires the producer, the persistence worker and the querier around one
//! shared [`AsyncCommitProcessor`]. There is no process-wide instance: the
//! node owns a [`FastQuery`] and passes its parts to whoever needs them.
//!
//! ```text
//!             ┌──────────── Arc<AsyncCommitProcessor> ────────────┐
//!             │                      │                            │
//!        WatcherTx ──JobQueue──→ PersistenceWorker ──→ store     Querier
//!        (producer)             (qc-18-persist)        ↑          │
//!                                                      └──────────┘
//! ```

mod pool;
mod querier;
mod watcher;
mod worker;

pub use pool::BatchPool;
pub use querier::Querier;
pub use watcher::WatcherTx;
pub use worker::{Job, JobQueue, PersistenceWorker, StoreApplier};

use std::sync::Arc;

use tracing::info;

use crate::adapters::indices::DerivedIndices;
use crate::domain::config::FastQueryConfig;
use crate::domain::errors::WatcherError;
use crate::domain::processor::AsyncCommitProcessor;
use crate::domain::querier::AcQuerier;
use crate::ports::outbound::WatchStore;

/// The assembled subsystem: one producer, one shared querier.
pub struct FastQuery {
    pub watcher: WatcherTx,
    pub querier: Arc<Querier>,
}

impl FastQuery {
    /// Builds the subsystem over `store` and starts the persistence worker.
    ///
    /// `bloom_store` receives replicated bloom index entries; without it they
    /// are dropped with a warning.
    pub fn build(
        config: FastQueryConfig,
        store: Arc<dyn WatchStore>,
        bloom_store: Option<Arc<dyn WatchStore>>,
    ) -> Result<Self, WatcherError> {
        config.validate()?;

        let processor = Arc::new(AsyncCommitProcessor::new());
        let indices = DerivedIndices::new(config.lru_size);
        let pool = BatchPool::new();
        let applier = StoreApplier::new(store.clone(), bloom_store, indices.clone(), &config);

        let worker = PersistenceWorker::new(
            applier.clone(),
            processor.clone(),
            pool.clone(),
            config.check_watch_db,
        );
        let queue = JobQueue::spawn(worker, config.commit_gap_height, config.backpressure)?;

        let ac = config
            .async_commit
            .then(|| AcQuerier::new(processor.clone()));
        let querier = Arc::new(Querier::new(config.enabled, store, ac, indices));

        info!(
            "[qc-18] Fast-query started (enabled: {}, async commit: {}, commit gap: {})",
            config.enabled, config.async_commit, config.commit_gap_height
        );

        let watcher = WatcherTx::new(config, processor, applier, pool, queue);
        Ok(Self { watcher, querier })
    }
}
