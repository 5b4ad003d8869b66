//! # Message Cache
//!
//! All mutations of one epoch (one block height), keyed by encoded store key.
//! Last write wins within an epoch. Deletes are materialized as tombstones
//! so a reader can tell "deleted in this epoch" apart from "never touched".

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::message::{Batch, WatchMessage};

#[derive(Debug, Default)]
pub struct MessageCache {
    messages: RwLock<HashMap<Vec<u8>, Arc<WatchMessage>>>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, msg: WatchMessage) {
        let mut messages = self.messages.write();
        messages.insert(msg.key(), Arc::new(msg));
    }

    pub fn batch_set<I>(&self, msgs: I)
    where
        I: IntoIterator<Item = WatchMessage>,
    {
        let mut messages = self.messages.write();
        for msg in msgs {
            messages.insert(msg.key(), Arc::new(msg));
        }
    }

    /// Records a tombstone for every key.
    pub fn batch_del<I>(&self, keys: I)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut messages = self.messages.write();
        for key in keys {
            messages.insert(key.clone(), Arc::new(WatchMessage::tombstone(key)));
        }
    }

    /// Accepts the wire form. `Delete` batches become tombstones.
    pub fn batch_set_ex<I>(&self, batches: I)
    where
        I: IntoIterator<Item = Batch>,
    {
        let mut messages = self.messages.write();
        for batch in batches {
            messages.insert(batch.key.clone(), Arc::new(WatchMessage::from_batch(batch)));
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Arc<WatchMessage>> {
        self.messages.read().get(key).cloned()
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Copies every entry of `other` over this cache (entries of `other` win).
    pub fn absorb(&self, other: &MessageCache) {
        let incoming: Vec<_> = other
            .messages
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        self.messages.write().extend(incoming);
    }

    /// All messages ordered by key.
    pub fn snapshot(&self) -> Vec<Arc<WatchMessage>> {
        let messages = self.messages.read();
        let mut entries: Vec<_> = messages.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, msg)| Arc::clone(msg)).collect()
    }
}
