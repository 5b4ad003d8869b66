//! # Persistence Worker
//!
//! The only writer of the query store (apart from the direct RPC-db puts).
//!
//! ## Single Consumer
//!
//! ```text
//!   WatcherTx ──submit(Job)──→ [bounded queue, cap = commit gap] ──→ qc-18-persist thread
//!                                                                        │
//!                                         StoreApplier::apply ←──────────┘
//!                                           ├─ store set/delete (retried)
//!                                           └─ derived index update
//! ```
//!
//! One dedicated OS thread drains the queue in FIFO order, which gives the
//! total-order durability guarantee without any store-level locking.
//! The queue is a tokio channel consumed with `blocking_recv`; producers use
//! `blocking_send` and therefore must not run on an async executor thread
//! (wrap calls in `spawn_blocking` there).

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sha2::{Digest, Sha256};
use shared_types::Hash;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::adapters::indices::DerivedIndices;
use crate::domain::codec;
use crate::domain::config::{BackpressurePolicy, FastQueryConfig};
use crate::domain::errors::WatcherError;
use crate::domain::keys;
use crate::domain::message::{OperationKind, WatchMessage};
use crate::domain::processor::AsyncCommitProcessor;
use crate::domain::watch_data::WatchData;
use crate::ports::outbound::{KVStoreError, WatchStore};

use super::pool::BatchPool;

const WORKER_THREAD_NAME: &str = "qc-18-persist";

/// Work items for the persistence worker.
#[derive(Debug)]
pub enum Job {
    /// Synchronous-mode epoch: de-duplicate and apply.
    CommitBatch {
        height: u64,
        batch: Vec<WatchMessage>,
    },
    /// Async-mode epoch: drain every sealed epoch of the processor.
    Persist { height: u64 },
    /// Delayed erasure of RPC-db copies.
    EraseKeys(Vec<Vec<u8>>),
    /// Replicated epoch received from a producer node.
    ApplyWatchData { height: u64, data: WatchData },
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::CommitBatch { .. } => "commit batch",
            Job::Persist { .. } => "persist",
            Job::EraseKeys(_) => "erase keys",
            Job::ApplyWatchData { .. } => "apply watch data",
        }
    }
}

// =============================================================================
// STORE APPLIER
// =============================================================================

/// Applies single writes to the store and keeps the derived indices in step.
#[derive(Clone)]
pub struct StoreApplier {
    store: Arc<dyn WatchStore>,
    bloom_store: Option<Arc<dyn WatchStore>>,
    indices: Arc<DerivedIndices>,
    max_retries: u32,
    backoff: Duration,
}

impl std::fmt::Debug for StoreApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreApplier")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("bloom_store", &self.bloom_store.is_some())
            .finish()
    }
}

impl StoreApplier {
    pub fn new(
        store: Arc<dyn WatchStore>,
        bloom_store: Option<Arc<dyn WatchStore>>,
        indices: Arc<DerivedIndices>,
        config: &FastQueryConfig,
    ) -> Self {
        Self {
            store,
            bloom_store,
            indices,
            max_retries: config.persist_max_retries,
            backoff: config.persist_retry_backoff,
        }
    }

    pub fn indices(&self) -> &Arc<DerivedIndices> {
        &self.indices
    }

    /// Applies one `(key, value, kind)` triple. Returns false when the write
    /// was dropped after exhausting its retries.
    pub fn apply(&self, key: &[u8], value: &[u8], kind: OperationKind) -> bool {
        let ok = if kind.is_delete() {
            self.retry("delete", key, || self.store.delete(key))
        } else {
            self.retry("set", key, || self.store.set(key, value))
        };
        self.update_indices(key, value, kind);
        ok
    }

    /// Single write outside the epoch pipeline (RPC-db fast path, code by
    /// hash). Not retried; the caller sees the store error.
    pub fn write(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.store.set(key, value)?;
        self.update_indices(key, value, OperationKind::Set);
        Ok(())
    }

    /// Runs after the store write, never before.
    fn update_indices(&self, key: &[u8], value: &[u8], kind: OperationKind) {
        // The code LRU is keyed by the bare hash.
        let code_hash = key
            .split_first()
            .filter(|(prefix, _)| **prefix == keys::PREFIX_CODE_HASH)
            .map(|(_, hash)| hash.to_vec());
        // Reads of a missing slot fall back to its RPC-db copy and cache it
        // under the slot key.
        let copied_slot = key
            .split_first()
            .filter(|(prefix, inner)| {
                **prefix == keys::PREFIX_RPC_DB && inner.first() == Some(&keys::PREFIX_STATE)
            })
            .map(|(_, inner)| inner.to_vec());
        if let Some(slot_key) = copied_slot {
            self.indices.state.evict(&slot_key);
        }

        if kind.is_delete() {
            self.indices.state.evict(&key.to_vec());
            if let Some(hash) = code_hash {
                self.indices.code.evict(&hash);
            }
            if key == keys::params_key().as_slice() {
                self.indices.params.clear();
            }
            return;
        }

        if let Some(hash) = code_hash {
            self.indices.code.put(hash, value.to_vec());
        }
        match kind {
            OperationKind::SetState => self.indices.state.put(key.to_vec(), value.to_vec()),
            OperationKind::SetParams => match codec::decode_params(value) {
                Ok(params) => self.indices.params.set(params),
                Err(e) => warn!("[qc-18] Persisted params do not decode: {}", e),
            },
            _ => {}
        }
    }

    /// Store delete outside the epoch pipeline (delayed erasure, dirty lists).
    pub fn erase(&self, key: &[u8]) -> bool {
        self.apply(key, &[], OperationKind::Delete)
    }

    /// Replays a replicated epoch exactly as the producer applied it.
    pub fn apply_watch_data(&self, data: &WatchData) {
        for batch in &data.batches {
            self.apply(&batch.key, &batch.value, batch.kind);
        }
        for address in &data.dirty_accounts {
            self.erase(&keys::account_key(address));
        }
        for key in &data.dirty_list {
            self.erase(key);
        }
        if data.bloom_data.is_empty() {
            return;
        }
        match &self.bloom_store {
            Some(bloom) => {
                for kv in &data.bloom_data {
                    self.retry("bloom set", &kv.key, || bloom.set(&kv.key, &kv.value));
                }
            }
            None => warn!(
                "[qc-18] Dropping {} bloom entries: no bloom index store",
                data.bloom_data.len()
            ),
        }
    }

    /// Digest over the persisted values of `keys` (absent keys are skipped).
    ///
    /// Producer and consumer log the same digest once they converge.
    pub fn check_watch_db(&self, keys: &[Vec<u8>], mode: &str, height: u64) -> Hash {
        let mut hasher = Sha256::new();
        let mut kv = Vec::with_capacity(keys.len());
        for key in keys {
            if let Ok(Some(value)) = self.store.get(key) {
                hasher.update(key);
                hasher.update(&value);
                kv.push(format!("{}={}", hex::encode(key), hex::encode(&value)));
            }
        }
        let digest: Hash = hasher.finalize().into();
        info!(
            mode,
            height,
            hash = %hex::encode(digest),
            kv = ?kv,
            "[qc-18] watchDB delta"
        );
        digest
    }

    fn retry<F>(&self, op: &'static str, key: &[u8], mut write: F) -> bool
    where
        F: FnMut() -> Result<(), KVStoreError>,
    {
        let mut delay = self.backoff;
        let mut attempt = 0;
        loop {
            match write() {
                Ok(()) => return true,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "[qc-18] Store {} failed for key {} (attempt {}/{}): {}",
                        op,
                        hex::encode(key),
                        attempt,
                        self.max_retries,
                        e
                    );
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                }
                Err(e) => {
                    error!(
                        "[qc-18] Dropping store {} for key {} after {} retries: {}",
                        op,
                        hex::encode(key),
                        self.max_retries,
                        e
                    );
                    return false;
                }
            }
        }
    }
}

// =============================================================================
// WORKER
// =============================================================================

/// State owned by the worker thread.
pub struct PersistenceWorker {
    applier: StoreApplier,
    processor: Arc<AsyncCommitProcessor>,
    pool: Arc<BatchPool>,
    check_watch_db: bool,
    /// Reused across epochs: key → index of its last write in the batch.
    scratch: HashMap<Vec<u8>, usize>,
}

impl PersistenceWorker {
    pub fn new(
        applier: StoreApplier,
        processor: Arc<AsyncCommitProcessor>,
        pool: Arc<BatchPool>,
        check_watch_db: bool,
    ) -> Self {
        Self {
            applier,
            processor,
            pool,
            check_watch_db,
            scratch: HashMap::new(),
        }
    }

    pub fn handle(&mut self, job: Job) {
        debug!("[qc-18] Worker handling {}", job.name());
        match job {
            Job::CommitBatch { height, batch } => self.commit_batch(height, batch),
            Job::Persist { height } => self.persist(height),
            Job::EraseKeys(keys) => {
                for key in &keys {
                    self.applier.erase(key);
                }
            }
            Job::ApplyWatchData { height, data } => {
                if data.is_empty() {
                    return;
                }
                self.applier.apply_watch_data(&data);
                if self.check_watch_db {
                    self.applier
                        .check_watch_db(&data.batch_keys(), "consumer", height);
                }
            }
        }
    }

    /// Last write per key wins; survivors are applied in batch order.
    fn commit_batch(&mut self, height: u64, batch: Vec<WatchMessage>) {
        self.scratch.clear();
        let keys: Vec<Vec<u8>> = batch.iter().map(WatchMessage::key).collect();
        for (idx, key) in keys.iter().enumerate() {
            self.scratch.insert(key.clone(), idx);
        }

        for (idx, msg) in batch.iter().enumerate() {
            if self.scratch.get(&keys[idx]) == Some(&idx) {
                self.applier.apply(&keys[idx], &msg.value(), msg.kind());
            }
        }
        debug!(
            "[qc-18] Applied {} of {} messages at height {}",
            self.scratch.len(),
            batch.len(),
            height
        );

        if self.check_watch_db {
            self.applier.check_watch_db(&keys, "producer", height);
        }
        self.pool.release(batch);
    }

    fn persist(&mut self, height: u64) {
        let applier = &self.applier;
        let mut touched = Vec::new();
        let check = self.check_watch_db;
        let drained = self.processor.persist_handler(|key, value, kind| {
            applier.apply(key, value, kind);
            if check {
                touched.push(key.to_vec());
            }
        });
        debug!("[qc-18] Drained {} epochs (job height {})", drained, height);

        if check && drained > 0 {
            self.applier.check_watch_db(&touched, "producer", height);
        }
    }

    fn run(mut self, mut rx: mpsc::Receiver<Job>) {
        info!("[qc-18] Persistence worker started");
        while let Some(job) = rx.blocking_recv() {
            self.handle(job);
        }
        info!("[qc-18] Persistence worker stopped");
    }
}

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Bounded handle to the worker thread.
///
/// Capacity equals the commit gap: at most that many epochs wait for disk
/// before the producer is blocked or rejected.
pub struct JobQueue {
    sender: Option<mpsc::Sender<Job>>,
    handle: Option<JoinHandle<()>>,
    policy: BackpressurePolicy,
}

impl JobQueue {
    pub fn spawn(
        worker: PersistenceWorker,
        capacity: usize,
        policy: BackpressurePolicy,
    ) -> Result<Self, WatcherError> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(rx))
            .map_err(|e| WatcherError::WorkerSpawn(e.to_string()))?;

        Ok(Self {
            sender: Some(tx),
            handle: Some(handle),
            policy,
        })
    }

    /// Jobs waiting in the queue.
    pub fn pending(&self) -> usize {
        self.sender
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.sender.as_ref().map(|tx| tx.max_capacity()).unwrap_or(0)
    }

    pub fn is_running(&self) -> bool {
        self.sender.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Admission check run before the producer hands over an epoch.
    ///
    /// Fails only under `BackpressurePolicy::Reject`; `Block` lets `submit`
    /// wait for a free slot instead.
    pub fn admit(&self) -> Result<(), WatcherError> {
        let tx = self.sender.as_ref().ok_or(WatcherError::WorkerStopped)?;
        if tx.is_closed() {
            return Err(WatcherError::WorkerStopped);
        }
        if self.policy == BackpressurePolicy::Reject && tx.capacity() == 0 {
            return Err(WatcherError::Backpressure {
                pending: tx.max_capacity(),
                capacity: tx.max_capacity(),
            });
        }
        Ok(())
    }

    /// Blocks while the queue is full. Must not be called from an async
    /// executor thread.
    pub fn submit(&self, job: Job) -> Result<(), WatcherError> {
        let tx = self.sender.as_ref().ok_or(WatcherError::WorkerStopped)?;
        match self.policy {
            BackpressurePolicy::Block => tx
                .blocking_send(job)
                .map_err(|_| WatcherError::WorkerStopped),
            BackpressurePolicy::Reject => tx.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => WatcherError::Backpressure {
                    pending: tx.max_capacity(),
                    capacity: tx.max_capacity(),
                },
                mpsc::error::TrySendError::Closed(_) => WatcherError::WorkerStopped,
            }),
        }
    }

    /// Stops accepting jobs and waits until every queued job was handled.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("[qc-18] Persistence worker panicked");
            }
        }
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryWatchStore;
    use crate::domain::message::Batch;
    use shared_types::{EvmParams, KeyValue};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config() -> FastQueryConfig {
        FastQueryConfig::enabled().with_persist_retries(2, Duration::from_millis(1))
    }

    fn applier_over(store: Arc<dyn WatchStore>) -> StoreApplier {
        StoreApplier::new(store, None, DerivedIndices::new(16), &config())
    }

    /// Fails the first `failures` writes, then delegates.
    struct FlakyStore {
        inner: InMemoryWatchStore,
        failures: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: InMemoryWatchStore::new(),
                failures: AtomicU32::new(failures),
            }
        }

        fn trip(&self) -> Result<(), KVStoreError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(KVStoreError::IOError {
                    message: "disk busy".into(),
                });
            }
            Ok(())
        }
    }

    impl WatchStore for FlakyStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
            self.trip()?;
            self.inner.set(key, value)
        }

        fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
            self.trip()?;
            self.inner.delete(key)
        }
    }

    #[test]
    fn test_apply_retries_then_succeeds() {
        let store = Arc::new(FlakyStore::new(2));
        let applier = applier_over(store.clone());

        assert!(applier.apply(b"k", b"v", OperationKind::Set));
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_apply_drops_after_retries() {
        let store = Arc::new(FlakyStore::new(10));
        let applier = applier_over(store.clone());

        assert!(!applier.apply(b"k", b"v", OperationKind::Set));
        assert_eq!(store.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_apply_updates_indices_in_same_step() {
        let store = Arc::new(InMemoryWatchStore::new());
        let applier = applier_over(store.clone());
        let state_key = keys::state_key(&[0x01; 20], &[0x02; 32]);

        applier.apply(&state_key, &[0x05], OperationKind::SetState);
        assert_eq!(applier.indices().state.get(&state_key), Some(vec![0x05]));

        applier.apply(&state_key, &[], OperationKind::Delete);
        assert!(applier.indices().state.get(&state_key).is_none());

        let params = EvmParams {
            enable_call: false,
            ..Default::default()
        };
        let encoded = codec::encode_params(&params).unwrap();
        applier.apply(&keys::params_key(), &encoded, OperationKind::SetParams);
        assert_eq!(applier.indices().params.get(), Some(params));
    }

    #[test]
    fn test_code_hash_writes_follow_code_lru() {
        let store = Arc::new(InMemoryWatchStore::new());
        let applier = applier_over(store.clone());
        let hash = [0xC0; 32];
        let code_key = keys::code_hash_key(&hash);

        applier.write(&code_key, &[0x60]).unwrap();
        assert_eq!(applier.indices().code.get(&hash.to_vec()), Some(vec![0x60]));

        let seen = applier.indices().code.generation();
        applier.erase(&code_key);
        assert!(applier.indices().code.get(&hash.to_vec()).is_none());
        assert!(!store.has(&code_key).unwrap());
        assert!(!applier.indices().code.fill(seen, hash.to_vec(), vec![0x60]));
    }

    #[test]
    fn test_rpc_copy_write_evicts_cached_slot() {
        let store = Arc::new(InMemoryWatchStore::new());
        let applier = applier_over(store.clone());
        let state_key = keys::state_key(&[0x01; 20], &[0x03; 32]);
        applier.indices().state.put(state_key.clone(), vec![0x01]);

        applier.write(&keys::rpc_db_key(&state_key), &[0x02]).unwrap();
        assert!(applier.indices().state.get(&state_key).is_none());
    }

    #[test]
    fn test_commit_batch_last_write_wins_and_releases_buffer() {
        let store = Arc::new(InMemoryWatchStore::new());
        let pool = BatchPool::new();
        let mut worker = PersistenceWorker::new(
            applier_over(store.clone()),
            Arc::new(AsyncCommitProcessor::new()),
            pool.clone(),
            true,
        );

        worker.handle(Job::CommitBatch {
            height: 1,
            batch: vec![
                WatchMessage::latest_height(1),
                WatchMessage::code_by_hash(vec![0x01], vec![0x11]),
                WatchMessage::latest_height(2),
            ],
        });

        assert_eq!(store.get(&keys::latest_height_key()).unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.len(), 2);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_apply_watch_data_replays_side_effects() {
        let store = Arc::new(InMemoryWatchStore::new());
        let bloom = Arc::new(InMemoryWatchStore::new());
        let applier = StoreApplier::new(
            store.clone(),
            Some(bloom.clone()),
            DerivedIndices::new(16),
            &config(),
        );
        let dirty = [0x0D; 20];
        store.set(&keys::account_key(&dirty), b"stale").unwrap();
        store.set(&[0x12, 0x01], b"").unwrap();

        applier.apply_watch_data(&WatchData {
            dirty_accounts: vec![dirty],
            batches: vec![Batch::new(vec![0x06], b"9".to_vec(), OperationKind::Set)],
            delay_erase_keys: vec![],
            bloom_data: vec![KeyValue::new(vec![0xB0], vec![0x01])],
            dirty_list: vec![vec![0x12, 0x01]],
        });

        assert_eq!(store.get(&[0x06]).unwrap(), Some(b"9".to_vec()));
        assert!(!store.has(&keys::account_key(&dirty)).unwrap());
        assert!(!store.has(&[0x12, 0x01]).unwrap());
        assert_eq!(bloom.get(&[0xB0]).unwrap(), Some(vec![0x01]));
    }

    #[test]
    fn test_check_watch_db_is_deterministic_and_skips_absent() {
        let a = Arc::new(InMemoryWatchStore::new());
        let b = Arc::new(InMemoryWatchStore::new());
        a.set(b"k", b"v").unwrap();
        b.set(b"k", b"v").unwrap();
        let keys = vec![b"k".to_vec(), b"missing".to_vec()];

        let ha = applier_over(a).check_watch_db(&keys, "producer", 1);
        let hb = applier_over(b.clone()).check_watch_db(&keys, "consumer", 1);
        assert_eq!(ha, hb);

        b.set(b"k", b"other").unwrap();
        assert_ne!(applier_over(b).check_watch_db(&keys, "consumer", 1), ha);
    }

    #[test]
    fn test_queue_processes_jobs_before_shutdown() {
        let store = Arc::new(InMemoryWatchStore::new());
        let pool = BatchPool::new();
        let worker = PersistenceWorker::new(
            applier_over(store.clone()),
            Arc::new(AsyncCommitProcessor::new()),
            pool,
            false,
        );
        let mut queue = JobQueue::spawn(worker, 4, BackpressurePolicy::Block).unwrap();
        assert!(queue.is_running());
        assert_eq!(queue.capacity(), 4);

        for h in 1..=10 {
            queue
                .submit(Job::CommitBatch {
                    height: h,
                    batch: vec![WatchMessage::latest_height(h)],
                })
                .unwrap();
        }
        queue.submit(Job::EraseKeys(vec![b"nothing".to_vec()])).unwrap();
        queue.shutdown();

        assert_eq!(store.get(&keys::latest_height_key()).unwrap(), Some(b"10".to_vec()));
        assert!(matches!(
            queue.submit(Job::Persist { height: 11 }),
            Err(WatcherError::WorkerStopped)
        ));
    }

    #[test]
    fn test_persist_job_drains_processor() {
        let store = Arc::new(InMemoryWatchStore::new());
        let processor = Arc::new(AsyncCommitProcessor::new());
        let mut worker = PersistenceWorker::new(
            applier_over(store.clone()),
            processor.clone(),
            BatchPool::new(),
            true,
        );

        processor.batch_set(vec![WatchMessage::latest_height(3)]);
        processor.move_to_commit_list(3);
        worker.handle(Job::Persist { height: 3 });

        assert_eq!(processor.pending_epochs(), 0);
        assert_eq!(store.get(&keys::latest_height_key()).unwrap(), Some(b"3".to_vec()));
    }
}
