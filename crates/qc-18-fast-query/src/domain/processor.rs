//! # Async Commit Processor
//!
//! Coordinates the epoch currently being written with the sealed epochs that
//! still wait for the persistence worker.
//!
//! ## Problem
//!
//! Block commit must not wait for disk writes, yet readers must never see a
//! state older than the last sealed epoch, and epochs must reach the store in
//! height order.
//!
//! ## Solution: Two-Tier Lookup Under One Lock
//!
//! ```text
//!   producer ──batch_set──→ [current] ──move_to_commit_list(v)──→ [commit cache]
//!                               │                                      │
//!   reader ──get──→ current ────┴──→ newest ... oldest ────────────────┘
//!                                                                      │
//!   worker ──persist_handler(sink)──→ oldest first ──→ sink ──→ remove ┘
//! ```
//!
//! `get` holds the processor read lock across both tiers and sealing takes
//! the write lock, so a reader sees a key either in the current cache or in
//! the freshly sealed epoch, never in neither. The drain applies an epoch to
//! the sink before removing it, so a key is always visible in a cache until
//! the store holds it.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::commit_cache::{CommitCache, Version};
use super::message::{Batch, OperationKind, WatchMessage};
use super::message_cache::MessageCache;

#[derive(Debug, Default)]
struct ProcessorState {
    current: Arc<MessageCache>,
    commits: CommitCache,
}

/// The read/write coordinator of the asynchronous commit pipeline.
#[derive(Debug, Default)]
pub struct AsyncCommitProcessor {
    state: RwLock<ProcessorState>,
    /// Serializes drains so an epoch is never applied by two callers at once.
    drain: Mutex<()>,
}

impl AsyncCommitProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    // === Producer side ===

    pub fn batch_set<I>(&self, msgs: I)
    where
        I: IntoIterator<Item = WatchMessage>,
    {
        self.state.read().current.batch_set(msgs);
    }

    pub fn batch_del<I>(&self, keys: I)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.state.read().current.batch_del(keys);
    }

    pub fn batch_set_ex<I>(&self, batches: I)
    where
        I: IntoIterator<Item = Batch>,
    {
        self.state.read().current.batch_set_ex(batches);
    }

    // === Reader side ===

    /// Current epoch first, then sealed epochs newest to oldest.
    pub fn get(&self, key: &[u8]) -> Option<Arc<WatchMessage>> {
        let state = self.state.read();
        state
            .current
            .get(key)
            .or_else(|| state.commits.get_element_from_cache(key))
    }

    // === Epoch boundary ===

    /// Seals the current epoch under `version` and starts a fresh one.
    ///
    /// An empty current epoch is not sealed. Re-sealing an existing version
    /// merges the current epoch over the sealed one.
    pub fn move_to_commit_list(&self, version: Version) {
        let mut state = self.state.write();
        if state.current.is_empty() {
            debug!("[qc-18] Nothing to seal at version {}", version);
            return;
        }

        let sealed = std::mem::take(&mut state.current);
        if let Some(last) = state.commits.last_version() {
            if version < last {
                warn!(
                    "[qc-18] Sealing version {} after version {}; pending order follows version",
                    version, last
                );
            }
        }

        let epoch = match state.commits.get(version) {
            Some(existing) => {
                let merged = MessageCache::new();
                merged.absorb(&existing);
                merged.absorb(&sealed);
                Arc::new(merged)
            }
            None => sealed,
        };
        state.commits.push_back(version, epoch);
        debug!(
            "[qc-18] Sealed version {} ({} epochs pending)",
            version,
            state.commits.size()
        );
    }

    // === Persistence ===

    /// Drains every sealed epoch oldest-first into `sink`, removing each
    /// epoch only after all of its messages were handed over.
    ///
    /// Returns the number of epochs drained. Calling it with nothing pending
    /// is a no-op.
    pub fn persist_handler<F>(&self, mut sink: F) -> usize
    where
        F: FnMut(&[u8], &[u8], OperationKind),
    {
        let _drain = self.drain.lock();
        let mut drained = 0;

        loop {
            let top = self.state.read().commits.get_top();
            let Some((version, epoch)) = top else {
                break;
            };

            for msg in epoch.snapshot() {
                sink(&msg.key(), &msg.value(), msg.kind());
            }

            let removed = self.state.write().commits.remove_if_same(version, &epoch);
            if removed {
                drained += 1;
                debug!("[qc-18] Persisted version {}", version);
            }
        }

        drained
    }

    /// Final seal plus blocking drain. Must be the last call before shutdown.
    pub fn close<F>(&self, version: Version, sink: F) -> usize
    where
        F: FnMut(&[u8], &[u8], OperationKind),
    {
        self.move_to_commit_list(version);
        self.persist_handler(sink)
    }

    // === Introspection ===

    pub fn pending_epochs(&self) -> usize {
        self.state.read().commits.size()
    }

    pub fn pending_versions(&self) -> Vec<Version> {
        self.state.read().commits.versions()
    }

    /// Number of distinct keys in the open epoch.
    pub fn current_len(&self) -> usize {
        self.state.read().current.len()
    }
}
