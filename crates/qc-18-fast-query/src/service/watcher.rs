//! # Watcher (producer side)
//!
//! Records the mutations of the block being executed and hands each finished
//! epoch to the persistence worker at commit.
//!
//! ## Epoch Flow
//!
//! ```text
//! new_height ──→ save_* ──→ finalize ──→ commit ──→ (next) new_height
//!                  │            │           │
//!                  │  stale ────┘           ├─ sync:  Job::CommitBatch
//!                  └─ immediate batch       └─ async: processor seal + Job::Persist
//! ```
//!
//! Receipts, transactions, blocks and list entries go to the immediate
//! batch. Account, code and state writes go to the stale batch and join the
//! epoch only at `finalize`.
//!
//! `WatcherTx` methods take `&mut self`: there is exactly one producer.

use std::collections::HashMap;
use std::sync::Arc;

use shared_types::{Address, BlockHeader, Bloom, EthAccount, EvmParams, Hash, KeyValue};
use tracing::{debug, info, warn};

use crate::domain::codec;
use crate::domain::config::FastQueryConfig;
use crate::domain::errors::WatcherError;
use crate::domain::keys;
use crate::domain::message::{Batch, WatchMessage};
use crate::domain::processor::AsyncCommitProcessor;
use crate::domain::records::{EthereumTx, ResultData, RpcBlock, RpcTransaction, TransactionReceipt};
use crate::domain::watch_data::{WatchData, WireCodec};

use super::pool::BatchPool;
use super::worker::{Job, JobQueue, StoreApplier};

pub struct WatcherTx {
    config: FastQueryConfig,
    enabled: bool,
    first_use: bool,

    height: u64,
    block_hash: Hash,
    header: BlockHeader,

    batch: Vec<WatchMessage>,
    stale_batch: Vec<WatchMessage>,
    cumulative_gas: HashMap<u64, u64>,
    gas_used: u64,
    block_txs: Vec<Hash>,

    watch_data: WatchData,
    delay_erase_keys: Vec<Vec<u8>>,

    processor: Arc<AsyncCommitProcessor>,
    applier: StoreApplier,
    pool: Arc<BatchPool>,
    queue: JobQueue,
}

impl WatcherTx {
    pub(crate) fn new(
        config: FastQueryConfig,
        processor: Arc<AsyncCommitProcessor>,
        applier: StoreApplier,
        pool: Arc<BatchPool>,
        queue: JobQueue,
    ) -> Self {
        let batch = pool.acquire();
        Self {
            enabled: config.enabled,
            config,
            first_use: true,
            height: 0,
            block_hash: [0u8; 32],
            header: BlockHeader::default(),
            batch,
            stale_batch: Vec::new(),
            cumulative_gas: HashMap::new(),
            gas_used: 0,
            block_txs: Vec::new(),
            watch_data: WatchData::default(),
            delay_erase_keys: Vec::new(),
            processor,
            applier,
            pool,
            queue,
        }
    }

    // === Switches ===

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self, on: bool) {
        self.enabled = on;
    }

    pub fn is_first_use(&self) -> bool {
        self.first_use
    }

    pub fn used(&mut self) {
        self.first_use = false;
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn processor(&self) -> &Arc<AsyncCommitProcessor> {
        &self.processor
    }

    /// Jobs waiting for the persistence worker.
    pub fn pending_jobs(&self) -> usize {
        self.queue.pending()
    }

    // === Epoch lifecycle ===

    pub fn new_height(&mut self, height: u64, block_hash: Hash, header: BlockHeader) {
        if !self.enabled {
            return;
        }
        if !self.batch.is_empty() {
            warn!(
                "[qc-18] Discarding {} uncommitted messages from height {}",
                self.batch.len(),
                self.height
            );
            self.batch.clear();
        }
        self.height = height;
        self.block_hash = block_hash;
        self.header = header;
        self.clean();
        self.watch_data = WatchData::default();
    }

    /// Appends the stale batch to the epoch.
    pub fn finalize(&mut self) {
        if !self.enabled {
            return;
        }
        self.batch.append(&mut self.stale_batch);
        self.reset();
    }

    pub fn reset(&mut self) {
        if !self.enabled {
            return;
        }
        self.stale_batch.clear();
    }

    /// Hands the epoch to the persistence worker.
    ///
    /// Under `BackpressurePolicy::Reject` a full queue fails with
    /// `Backpressure` and leaves the epoch in place for a retry. Must not be
    /// called from an async executor thread.
    pub fn commit(&mut self) -> Result<(), WatcherError> {
        if !self.enabled {
            return Ok(());
        }
        self.queue.admit()?;

        let mut batch = std::mem::replace(&mut self.batch, self.pool.acquire());
        self.watch_data.batches = batch.iter().map(Batch::from).collect();
        self.clean();

        if self.config.async_commit {
            self.processor.batch_set(batch.drain(..));
            self.pool.release(batch);
            self.processor.move_to_commit_list(self.height);
            self.queue.submit(Job::Persist {
                height: self.height,
            })
        } else {
            self.queue.submit(Job::CommitBatch {
                height: self.height,
                batch,
            })
        }
    }

    /// Stops the worker once it has handled every queued job, then seals and
    /// drains whatever the processor still holds. Returns the number of
    /// epochs drained by the final flush.
    pub fn close(&mut self) -> usize {
        self.queue.shutdown();
        if !self.config.async_commit {
            return 0;
        }
        let applier = &self.applier;
        let drained = self
            .processor
            .close(self.height, |key, value, kind| {
                applier.apply(key, value, kind);
            });
        info!(
            "[qc-18] Watcher closed at height {} ({} epochs flushed)",
            self.height, drained
        );
        drained
    }

    fn clean(&mut self) {
        self.cumulative_gas.clear();
        self.gas_used = 0;
        self.block_txs.clear();
    }

    fn push(&mut self, msg: Result<WatchMessage, WatcherError>, stale: bool) {
        match msg {
            Ok(msg) if stale => self.stale_batch.push(msg),
            Ok(msg) => self.batch.push(msg),
            Err(e) => warn!("[qc-18] Skipping message at height {}: {}", self.height, e),
        }
    }

    // === Immediate batch ===

    pub fn save_ethereum_tx(&mut self, tx: &EthereumTx, tx_hash: Hash, index: u64) {
        if !self.enabled {
            return;
        }
        let rpc_tx = RpcTransaction::new(tx, tx_hash, self.block_hash, self.height, index);
        self.push(WatchMessage::transaction(&rpc_tx), false);
        self.update_block_txs(tx_hash);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn save_transaction_receipt(
        &mut self,
        status: u64,
        tx: &EthereumTx,
        tx_hash: Hash,
        tx_index: u64,
        data: &ResultData,
        gas_used: u64,
    ) {
        if !self.enabled {
            return;
        }
        self.update_cumulative_gas(tx_index, gas_used);
        let cumulative = self.cumulative_gas.get(&tx_index).copied().unwrap_or(gas_used);
        let receipt = TransactionReceipt::new(
            status,
            tx,
            tx_hash,
            self.block_hash,
            tx_index,
            self.height,
            data,
            cumulative,
            gas_used,
        );
        self.push(WatchMessage::receipt(&receipt), false);
    }

    /// Cumulative gas of `tx_index` is that of the previous index plus
    /// `gas_used`.
    pub fn update_cumulative_gas(&mut self, tx_index: u64, gas_used: u64) {
        if !self.enabled {
            return;
        }
        let previous = if self.cumulative_gas.is_empty() {
            0
        } else {
            tx_index
                .checked_sub(1)
                .and_then(|prev| self.cumulative_gas.get(&prev).copied())
                .unwrap_or(0)
        };
        self.cumulative_gas
            .insert(tx_index, previous.saturating_add(gas_used));
        self.gas_used = self.gas_used.saturating_add(gas_used);
    }

    pub fn update_block_txs(&mut self, tx_hash: Hash) {
        if !self.enabled {
            return;
        }
        self.block_txs.push(tx_hash);
    }

    /// Block record, height → hash index and latest height.
    pub fn save_block(&mut self, bloom: Bloom) {
        if !self.enabled {
            return;
        }
        let block = RpcBlock::new(
            self.block_hash,
            &self.header,
            bloom,
            self.gas_used,
            self.block_txs.clone(),
        );
        self.push(WatchMessage::block(&block), false);
        self.push(Ok(WatchMessage::block_info(self.height, self.block_hash)), false);
        self.save_latest_height(self.height);
    }

    pub fn save_latest_height(&mut self, height: u64) {
        if !self.enabled {
            return;
        }
        self.push(Ok(WatchMessage::latest_height(height)), false);
    }

    pub fn save_params(&mut self, params: EvmParams) {
        if !self.enabled {
            return;
        }
        self.push(WatchMessage::params(params), false);
    }

    pub fn save_contract_blocked_list_item(&mut self, address: Address) {
        if !self.enabled {
            return;
        }
        self.push(Ok(WatchMessage::contract_blocked_list_item(address)), false);
    }

    pub fn save_contract_method_blocked_list_item(&mut self, address: Address, methods: Vec<u8>) {
        if !self.enabled {
            return;
        }
        self.push(
            Ok(WatchMessage::contract_method_blocked_list_item(address, methods)),
            false,
        );
    }

    pub fn save_contract_deployment_whitelist_item(&mut self, address: Address) {
        if !self.enabled {
            return;
        }
        self.push(Ok(WatchMessage::contract_deployment_whitelist_item(address)), false);
    }

    // === Stale batch ===

    pub fn save_contract_code(&mut self, address: Address, code: &[u8]) {
        if !self.enabled {
            return;
        }
        self.push(WatchMessage::code(address, code, self.height), true);
    }

    pub fn save_contract_code_by_hash(&mut self, code_hash: &[u8], code: &[u8]) {
        if !self.enabled {
            return;
        }
        self.push(Ok(WatchMessage::code_by_hash(code_hash, code)), true);
    }

    pub fn save_state(&mut self, address: Address, slot: &[u8], value: &[u8]) {
        if !self.enabled {
            return;
        }
        self.push(Ok(WatchMessage::state(&address, slot, value)), true);
    }

    /// Goes to the immediate batch when `directly`, else to the stale batch.
    pub fn save_account(&mut self, account: EthAccount, directly: bool) {
        if !self.enabled {
            return;
        }
        self.push(WatchMessage::account(account), !directly);
    }

    pub fn add_del_acc_msg(&mut self, address: Address, directly: bool) {
        if !self.enabled {
            return;
        }
        self.push(Ok(WatchMessage::delete_account(address)), !directly);
    }

    // === Deletions and side effects ===

    /// Erases the account record now; its RPC-db copy waits for the next
    /// `delay_erase_key`, since RPC readers fall back to it in the meantime.
    pub fn delete_account(&mut self, address: Address) {
        if !self.enabled {
            return;
        }
        let key = keys::account_key(&address);
        if self.config.async_commit {
            self.processor.batch_del(vec![key.clone()]);
        } else {
            // An epoch still queued for the worker may rewrite the account.
            self.push(Ok(WatchMessage::tombstone(key.clone())), false);
        }
        self.applier.erase(&key);
        self.delay_erase_keys.push(keys::rpc_db_key(&key));
    }

    /// Dispatches the queued erasures to the worker.
    pub fn delay_erase_key(&mut self) -> Result<(), WatcherError> {
        if !self.enabled || self.delay_erase_keys.is_empty() {
            return Ok(());
        }
        let erase = std::mem::take(&mut self.delay_erase_keys);
        debug!("[qc-18] Erasing {} delayed keys", erase.len());
        self.queue.submit(Job::EraseKeys(erase))
    }

    pub fn add_dirty_account(&mut self, address: Address) {
        self.watch_data.dirty_accounts.push(address);
    }

    /// Bloom index entries travel with the epoch's replication envelope.
    pub fn add_bloom_data(&mut self, entry: KeyValue) {
        self.watch_data.bloom_data.push(entry);
    }

    pub fn delete_contract_blocked_list(&mut self, address: Address) {
        self.delete_list_key(keys::black_list_key(&address));
    }

    pub fn delete_contract_deployment_whitelist(&mut self, address: Address) {
        self.delete_list_key(keys::white_list_key(&address));
    }

    fn delete_list_key(&mut self, key: Vec<u8>) {
        if !self.enabled {
            return;
        }
        if self.config.async_commit {
            // Shadow any pending insert until the store delete is visible.
            self.processor.batch_del(vec![key.clone()]);
        }
        self.applier.erase(&key);
        self.watch_data.dirty_list.push(key);
    }

    // === RPC-db fast path ===

    pub fn commit_state_to_rpc_db(
        &self,
        address: Address,
        slot: &[u8],
        value: &[u8],
    ) -> Result<(), WatcherError> {
        if !self.enabled {
            return Ok(());
        }
        let key = keys::rpc_db_key(&keys::state_key(&address, slot));
        Ok(self.applier.write(&key, value)?)
    }

    pub fn commit_account_to_rpc_db(&self, account: &EthAccount) -> Result<(), WatcherError> {
        if !self.enabled {
            return Ok(());
        }
        let key = keys::rpc_db_key(&keys::account_key(&account.address));
        let value = codec::encode_account(account)?;
        Ok(self.applier.write(&key, &value)?)
    }

    pub fn commit_code_hash_to_db(&self, code_hash: &[u8], code: &[u8]) -> Result<(), WatcherError> {
        if !self.enabled {
            return Ok(());
        }
        Ok(self.applier.write(&keys::code_hash_key(code_hash), code)?)
    }

    // === Replication ===

    /// Snapshot of the sealed epoch's envelope; calling the closure encodes
    /// the de-duplicated envelope with the binary codec.
    pub fn get_watch_data_func(
        &self,
    ) -> impl FnOnce() -> Result<Vec<u8>, WatcherError> + Send + 'static {
        let mut data = self.watch_data.clone();
        data.delay_erase_keys = self.delay_erase_keys.clone();
        move || data.filter_copy().encode(WireCodec::Binary)
    }

    pub fn unmarshal_watch_data(&self, bytes: &[u8]) -> Result<WatchData, WatcherError> {
        WatchData::decode(bytes)
    }

    /// Re-applies a replicated epoch through the worker and adopts its
    /// pending erasures.
    pub fn use_watch_data(&mut self, data: WatchData) -> Result<(), WatcherError> {
        self.queue.admit()?;
        self.delay_erase_keys = data.delay_erase_keys.clone();
        self.queue.submit(Job::ApplyWatchData {
            height: self.height,
            data,
        })
    }

    pub fn check_watch_db(&self, keys: &[Vec<u8>], mode: &str) -> Hash {
        self.applier.check_watch_db(keys, mode, self.height)
    }
}

impl Drop for WatcherTx {
    fn drop(&mut self) {
        if self.queue.is_running() {
            self.close();
        }
    }
}
