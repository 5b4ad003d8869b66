//! # Domain Layer
//!
//! Pure fast-query logic: record types, the per-epoch caches, the commit
//! processor and the typed decode layer. Nothing here touches the store.
//!
//! ## Modules
//!
//! - `keys` - Store key namespace
//! - `records` - RPC-facing records (transactions, receipts, blocks, code)
//! - `codec` - Value encodings per record kind
//! - `message` - `WatchMessage`, `Batch`, `OperationKind`
//! - `message_cache` - Mutations of one epoch
//! - `commit_cache` - Sealed epochs awaiting persistence
//! - `processor` - Two-tier read/seal/drain coordinator
//! - `querier` - Typed getters over the processor
//! - `watch_data` - Replication envelope
//! - `config` / `errors`

pub mod codec;
pub mod commit_cache;
pub mod config;
pub mod errors;
pub mod keys;
pub mod message;
pub mod message_cache;
pub mod processor;
pub mod querier;
pub mod records;
pub mod watch_data;
