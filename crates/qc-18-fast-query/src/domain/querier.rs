//! # Typed Querier
//!
//! Decodes messages held by the [`AsyncCommitProcessor`] into domain records.
//!
//! Every getter accepts both the typed variant written by the local producer
//! and the generic `Batch` form that replicated data always arrives as.
//!
//! ## Three-Way Result
//!
//! | Cache state | Getter result |
//! |-------------|---------------|
//! | key in no epoch | `Err(NotFound)` |
//! | tombstone | `Ok(None)` |
//! | value | `Ok(Some(v))` |
//!
//! `NotFound` here only means "not in the cache"; callers fall through to the
//! store on it, and stop on a tombstone.

use std::sync::Arc;

use shared_types::{Address, EthAccount, EvmParams};

use super::codec;
use super::errors::WatcherError;
use super::keys;
use super::message::WatchMessage;
use super::processor::AsyncCommitProcessor;
use super::records::CodeInfo;

/// Where a key stands across the current and pending epochs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// No epoch mentions the key.
    Absent,
    /// The newest epoch mentioning the key deleted it.
    Deleted,
    Present(Arc<WatchMessage>),
}

#[derive(Debug, Clone)]
pub struct AcQuerier {
    processor: Arc<AsyncCommitProcessor>,
}

impl AcQuerier {
    pub fn new(processor: Arc<AsyncCommitProcessor>) -> Self {
        Self { processor }
    }

    pub fn processor(&self) -> &Arc<AsyncCommitProcessor> {
        &self.processor
    }

    pub fn lookup(&self, key: &[u8]) -> Lookup {
        match self.processor.get(key) {
            None => Lookup::Absent,
            Some(msg) if msg.kind().is_delete() => Lookup::Deleted,
            Some(msg) => Lookup::Present(msg),
        }
    }

    /// Encoded value of any record kind.
    pub fn get_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>, WatcherError> {
        match self.lookup(key) {
            Lookup::Absent => Err(WatcherError::NotFound),
            Lookup::Deleted => Ok(None),
            Lookup::Present(msg) => Ok(Some(msg.value().into_owned())),
        }
    }

    pub fn get_latest_block_number(&self) -> Result<Option<u64>, WatcherError> {
        let key = keys::latest_height_key();
        self.typed(&key, "latest height", |msg| match msg {
            WatchMessage::LatestHeight { height } => Some(Ok(*height)),
            WatchMessage::Batch(batch) => Some(codec::decode_height(&batch.value)),
            _ => None,
        })
    }

    pub fn get_code(&self, address: &Address) -> Result<Option<CodeInfo>, WatcherError> {
        let key = keys::code_key(address);
        self.typed(&key, "code", |msg| match msg {
            WatchMessage::Code { info, .. } => Some(Ok(info.clone())),
            WatchMessage::Batch(batch) => Some(codec::decode_code_info(&batch.value)),
            _ => None,
        })
    }

    pub fn get_code_by_hash(&self, code_hash: &[u8]) -> Result<Option<Vec<u8>>, WatcherError> {
        let key = keys::code_hash_key(code_hash);
        self.typed(&key, "code by hash", |msg| match msg {
            WatchMessage::CodeByHash { code, .. } => Some(Ok(code.clone())),
            WatchMessage::Batch(batch) => Some(Ok(batch.value.clone())),
            _ => None,
        })
    }

    /// Returns an owned copy; the cached account is never handed out.
    pub fn get_account(&self, address: &Address) -> Result<Option<EthAccount>, WatcherError> {
        let key = keys::account_key(address);
        self.typed(&key, "account", |msg| match msg {
            WatchMessage::Account { account, .. } => Some(Ok(account.clone())),
            WatchMessage::Batch(batch) => Some(codec::decode_account(&batch.value)),
            _ => None,
        })
    }

    /// `key` is the full state key (see [`keys::state_key`]).
    pub fn get_state(&self, key: &[u8]) -> Result<Option<Vec<u8>>, WatcherError> {
        self.typed(key, "state", |msg| match msg {
            WatchMessage::State { value, .. } => Some(Ok(value.clone())),
            WatchMessage::Batch(batch) => Some(Ok(batch.value.clone())),
            _ => None,
        })
    }

    pub fn get_params(&self) -> Result<Option<EvmParams>, WatcherError> {
        let key = keys::params_key();
        self.typed(&key, "params", |msg| match msg {
            WatchMessage::Params { params, .. } => Some(Ok(params.clone())),
            WatchMessage::Batch(batch) => Some(codec::decode_params(&batch.value)),
            _ => None,
        })
    }

    /// Membership test for list keys. A tombstone answers `false`.
    pub fn has(&self, key: &[u8]) -> Result<bool, WatcherError> {
        match self.lookup(key) {
            Lookup::Absent => Err(WatcherError::NotFound),
            Lookup::Deleted => Ok(false),
            Lookup::Present(_) => Ok(true),
        }
    }

    /// Raw method list stored under the blocked-list key of `address`.
    pub fn get_blocked_list_entry(&self, address: &Address) -> Result<Option<Vec<u8>>, WatcherError> {
        let key = keys::black_list_key(address);
        self.typed(&key, "blocked list item", |msg| match msg {
            WatchMessage::ContractBlockedListItem { .. }
            | WatchMessage::ContractMethodBlockedListItem { .. } => Some(Ok(msg.value().into_owned())),
            WatchMessage::Batch(batch) => Some(Ok(batch.value.clone())),
            _ => None,
        })
    }

    /// Shared three-way contract. `decode` returns `None` when the cached
    /// variant does not belong to `expected`.
    fn typed<T, F>(&self, key: &[u8], expected: &'static str, decode: F) -> Result<Option<T>, WatcherError>
    where
        F: FnOnce(&WatchMessage) -> Option<Result<T, WatcherError>>,
    {
        match self.lookup(key) {
            Lookup::Absent => Err(WatcherError::NotFound),
            Lookup::Deleted => Ok(None),
            Lookup::Present(msg) => match decode(&msg) {
                Some(result) => result.map(Some),
                None => Err(WatcherError::WrongType {
                    key: hex::encode(key),
                    expected,
                }),
            },
        }
    }
}
