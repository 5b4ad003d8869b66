//! # WatchData
//!
//! Replication envelope carrying every side effect of one block that a
//! query-serving replica needs to reproduce the producer's view without
//! re-executing the block.
//!
//! Two encodings are accepted on the wire: bincode (compact, the default)
//! and JSON (debugging and migration). [`WatchData::decode`] sniffs the
//! payload so consumers accept either.

use std::collections::HashMap;
use std::hash::Hash as StdHash;

use serde::{Deserialize, Serialize};
use shared_types::{Address, KeyValue};

use super::errors::WatcherError;
use super::message::Batch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireCodec {
    #[default]
    Binary,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WatchData {
    /// Accounts whose cached snapshot must be dropped on the replica.
    #[serde(rename = "dirty_account")]
    pub dirty_accounts: Vec<Address>,
    pub batches: Vec<Batch>,
    /// RPC-db keys erased once the next block starts.
    #[serde(rename = "delay_erase_key")]
    pub delay_erase_keys: Vec<Vec<u8>>,
    /// Bloom index entries, written to the bloom index store.
    pub bloom_data: Vec<KeyValue>,
    /// Blocked/whitelist keys removed in this block.
    pub dirty_list: Vec<Vec<u8>>,
}

impl WatchData {
    /// Total number of entries across all lists.
    pub fn size(&self) -> usize {
        self.dirty_accounts.len()
            + self.batches.len()
            + self.delay_erase_keys.len()
            + self.bloom_data.len()
            + self.dirty_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn encode(&self, codec: WireCodec) -> Result<Vec<u8>, WatcherError> {
        match codec {
            WireCodec::Binary => {
                bincode::serialize(self).map_err(|e| WatcherError::encode("watch data", e))
            }
            WireCodec::Json => {
                serde_json::to_vec(self).map_err(|e| WatcherError::encode("watch data", e))
            }
        }
    }

    /// Decodes either wire form. Empty input is an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, WatcherError> {
        if bytes.is_empty() {
            return Err(WatcherError::EmptyWatchData);
        }
        if bytes[0] == b'{' {
            if let Ok(wd) = serde_json::from_slice(bytes) {
                return Ok(wd);
            }
        }
        bincode::deserialize(bytes).map_err(|e| WatcherError::decode("watch data", e))
    }

    /// Copy with every list de-duplicated by key. The last occurrence wins
    /// and keeps the position of the first.
    pub fn filter_copy(&self) -> Self {
        Self {
            dirty_accounts: dedup_last_wins(&self.dirty_accounts, |a| *a),
            batches: dedup_last_wins(&self.batches, |b| b.key.clone()),
            delay_erase_keys: dedup_last_wins(&self.delay_erase_keys, |k| k.clone()),
            bloom_data: dedup_last_wins(&self.bloom_data, |kv| kv.key.clone()),
            dirty_list: dedup_last_wins(&self.dirty_list, |k| k.clone()),
        }
    }

    /// Keys of the replicated batches, in order.
    pub fn batch_keys(&self) -> Vec<Vec<u8>> {
        self.batches.iter().map(|b| b.key.clone()).collect()
    }
}

fn dedup_last_wins<T, K, F>(items: &[T], key_of: F) -> Vec<T>
where
    T: Clone,
    K: Eq + StdHash,
    F: Fn(&T) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::with_capacity(items.len());
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match slots.get(&key_of(item)) {
            Some(&idx) => out[idx] = item.clone(),
            None => {
                slots.insert(key_of(item), out.len());
                out.push(item.clone());
            }
        }
    }
    out
}
