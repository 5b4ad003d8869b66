//! # Fast-Query Subsystem (qc-18)
//!
//! A write-back cache in front of the JSON-RPC query store. Block commit
//! hands each block's mutations to a background worker and returns; RPC
//! reads see those mutations immediately through the pending-epoch cache.
//!
//! ## Architecture
//!
//! ```text
//!   Block executor                                         JSON-RPC
//!        │                                                    │
//!        ▼                                                    ▼
//!   WatcherTx ── seal ──→ AsyncCommitProcessor ←── read ── Querier
//!        │               [current | sealed epochs]            │
//!        │                         │ drain                    │
//!        └── JobQueue ──→ PersistenceWorker ──→ WatchStore ←──┘
//!           (bounded)      (qc-18-persist)
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Description |
//! |-----------|-------------|
//! | Read-your-writes | A committed epoch is readable before it is persisted |
//! | Most-recent-wins | Newer epochs shadow older ones and the store |
//! | Ordered drain | Epochs reach the store in commit order |
//! | Pending deletes | A tombstone hides the stored value until drained |
//! | Bounded lag | At most `commit_gap_height` epochs wait for the worker |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Messages, epoch caches, the commit processor, records
//! - `ports/` - `FastQueryApi` (inbound) and `WatchStore` (outbound)
//! - `adapters/` - In-memory store and LRU indices
//! - `service/` - Producer, persistence worker and querier
//!
//! ## Usage
//!
//! ```ignore
//! use qc_18_fast_query::{FastQuery, FastQueryApi, FastQueryConfig, InMemoryWatchStore};
//!
//! let store = Arc::new(InMemoryWatchStore::new());
//! let config = FastQueryConfig::enabled().with_async_commit(true);
//! let FastQuery { mut watcher, querier } = FastQuery::build(config, store, None)?;
//!
//! watcher.new_height(1, block_hash, header);
//! watcher.save_block(bloom);
//! watcher.commit()?;
//!
//! assert_eq!(querier.get_latest_block_number()?, 1);
//! watcher.close();
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::indices::DerivedIndices;
pub use adapters::memory_store::InMemoryWatchStore;
pub use domain::config::{
    BackpressurePolicy, FastQueryConfig, DEFAULT_COMMIT_GAP_HEIGHT, DEFAULT_LRU_SIZE,
};
pub use domain::errors::WatcherError;
pub use domain::keys;
pub use domain::message::{Batch, OperationKind, WatchMessage};
pub use domain::processor::AsyncCommitProcessor;
pub use domain::querier::{AcQuerier, Lookup};
pub use domain::records::{
    BlockTransactions, CodeInfo, EthereumTx, ResultData, RpcBlock, RpcTransaction,
    TransactionReceipt, TRANSACTION_FAILED, TRANSACTION_SUCCESS,
};
pub use domain::watch_data::{WatchData, WireCodec};
pub use ports::inbound::FastQueryApi;
pub use ports::outbound::{KVStoreError, WatchStore};
pub use service::{BatchPool, FastQuery, Querier, WatcherTx};
