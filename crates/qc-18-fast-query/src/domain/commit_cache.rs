//! # Commit Cache
//!
//! Sealed epochs waiting for persistence, ordered by version.
//!
//! ## Ordering
//!
//! Epochs are sealed in height order, so version order and insertion order
//! coincide. A `BTreeMap` gives both the FIFO drain (`get_top` is the
//! smallest version) and the newest-first scan readers need, with
//! logarithmic removal by version.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::message::WatchMessage;
use super::message_cache::MessageCache;

/// Epoch identifier: the block height the epoch was sealed at.
pub type Version = u64;

#[derive(Debug, Default)]
pub struct CommitCache {
    epochs: BTreeMap<Version, Arc<MessageCache>>,
}

impl CommitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an epoch. Re-sealing an existing version replaces it in place
    /// and returns the replaced cache.
    pub fn push_back(&mut self, version: Version, cache: Arc<MessageCache>) -> Option<Arc<MessageCache>> {
        self.epochs.insert(version, cache)
    }

    pub fn remove(&mut self, version: Version) -> Option<Arc<MessageCache>> {
        self.epochs.remove(&version)
    }

    /// Removes `version` only if it still holds `expected`.
    pub fn remove_if_same(&mut self, version: Version, expected: &Arc<MessageCache>) -> bool {
        match self.epochs.get(&version) {
            Some(current) if Arc::ptr_eq(current, expected) => {
                self.epochs.remove(&version);
                true
            }
            _ => false,
        }
    }

    /// Oldest pending epoch, without removing it.
    pub fn get_top(&self) -> Option<(Version, Arc<MessageCache>)> {
        self.epochs
            .first_key_value()
            .map(|(version, cache)| (*version, Arc::clone(cache)))
    }

    pub fn get(&self, version: Version) -> Option<Arc<MessageCache>> {
        self.epochs.get(&version).cloned()
    }

    pub fn size(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last_version(&self) -> Option<Version> {
        self.epochs.last_key_value().map(|(version, _)| *version)
    }

    pub fn versions(&self) -> Vec<Version> {
        self.epochs.keys().copied().collect()
    }

    /// Newest-to-oldest scan; the first epoch holding `key` wins.
    pub fn get_element_from_cache(&self, key: &[u8]) -> Option<Arc<WatchMessage>> {
        self.epochs.values().rev().find_map(|cache| cache.get(key))
    }
}
