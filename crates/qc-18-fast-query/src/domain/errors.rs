use thiserror::Error;

use crate::ports::outbound::KVStoreError;

/// Errors surfaced by the fast-query read and write paths.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// Key is absent from the current epoch, every pending epoch and the store.
    #[error("Not found")]
    NotFound,

    /// A cached message of one record kind was found under a key of another.
    #[error("Wrong message type at key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },

    /// Stored bytes could not be decoded into the expected record.
    #[error("Decode error ({kind}): {message}")]
    Decode { kind: &'static str, message: String },

    /// A record could not be encoded for storage or replication.
    #[error("Encode error ({kind}): {message}")]
    Encode { kind: &'static str, message: String },

    #[error("Unknown operation kind: {0}")]
    UnknownOperationKind(u32),

    /// The fast-query subsystem is switched off.
    #[error("Fast-query is disabled")]
    Disabled,

    #[error("Failed to unmarshal watch data: empty data")]
    EmptyWatchData,

    /// The persistence queue is full and the policy rejects new epochs.
    #[error("Persistence queue full: {pending} epochs pending (commit gap {capacity})")]
    Backpressure { pending: usize, capacity: usize },

    /// The persistence worker has shut down.
    #[error("Persistence worker stopped")]
    WorkerStopped,

    #[error("Failed to start persistence worker: {0}")]
    WorkerSpawn(String),

    #[error("Store error: {0}")]
    Store(#[from] KVStoreError),

    #[error("Contract {address} is not deployed at height {height}")]
    NotDeployedAtHeight { address: String, height: u64 },

    #[error("No such transaction in target block")]
    NoSuchTransaction,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WatcherError {
    pub(crate) fn decode(kind: &'static str, err: impl std::fmt::Display) -> Self {
        WatcherError::Decode {
            kind,
            message: err.to_string(),
        }
    }

    pub(crate) fn encode(kind: &'static str, err: impl std::fmt::Display) -> Self {
        WatcherError::Encode {
            kind,
            message: err.to_string(),
        }
    }

    /// True for the "resource does not exist" class.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WatcherError::NotFound)
    }
}
