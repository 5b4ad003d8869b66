//! # Querier (RPC-facing reads)
//!
//! Serves JSON-RPC reads from the freshest tier that knows the key:
//!
//! ```text
//! async commit on:   current epoch → sealed epochs (newest first) → store
//! async commit off:  store
//! ```
//!
//! A pending delete stops the lookup: the record is reported as not found
//! even if the store still holds the old value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shared_types::{to_hex_prefixed, Address, EthAccount, EvmParams, Hash};
use tracing::warn;

use crate::adapters::indices::DerivedIndices;
use crate::domain::codec;
use crate::domain::errors::WatcherError;
use crate::domain::keys;
use crate::domain::querier::{AcQuerier, Lookup};
use crate::domain::records::{
    BlockTransactions, CodeInfo, RpcBlock, RpcTransaction, TransactionReceipt, EMPTY_ROOT_HASH,
    EMPTY_UNCLE_HASH,
};
use crate::ports::inbound::FastQueryApi;
use crate::ports::outbound::WatchStore;

pub struct Querier {
    enabled: AtomicBool,
    store: Arc<dyn WatchStore>,
    /// Present only in async-commit mode.
    ac: Option<AcQuerier>,
    indices: Arc<DerivedIndices>,
}

impl Querier {
    pub fn new(
        enabled: bool,
        store: Arc<dyn WatchStore>,
        ac: Option<AcQuerier>,
        indices: Arc<DerivedIndices>,
    ) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            store,
            ac,
            indices,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self, on: bool) {
        self.enabled.store(on, Ordering::Release);
    }

    fn check_enabled(&self) -> Result<(), WatcherError> {
        if self.enabled() {
            Ok(())
        } else {
            Err(WatcherError::Disabled)
        }
    }

    /// Cache tier. `Ok(Some)` is a hit, `Ok(None)` means "ask the store",
    /// a tombstone ends the lookup with `NotFound`.
    fn cached<T, F>(&self, get: F) -> Result<Option<T>, WatcherError>
    where
        F: FnOnce(&AcQuerier) -> Result<Option<T>, WatcherError>,
    {
        let Some(ac) = &self.ac else {
            return Ok(None);
        };
        match get(ac) {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => Err(WatcherError::NotFound),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store_read(&self, key: &[u8]) -> Result<Vec<u8>, WatcherError> {
        self.store.get(key)?.ok_or(WatcherError::NotFound)
    }

    /// Raw value through both tiers.
    fn read(&self, key: &[u8]) -> Result<Vec<u8>, WatcherError> {
        match self.cached(|ac| ac.get_value(key))? {
            Some(value) => Ok(value),
            None => self.store_read(key),
        }
    }

    fn store_has(&self, key: &[u8]) -> Result<bool, WatcherError> {
        if let Some(ac) = &self.ac {
            match ac.lookup(key) {
                Lookup::Present(_) => return Ok(true),
                Lookup::Deleted => return Ok(false),
                Lookup::Absent => {}
            }
        }
        Ok(self.store.has(key)?)
    }

    fn resolve_height(&self, number: u64) -> Result<u64, WatcherError> {
        if number == 0 {
            self.get_latest_block_number()
        } else {
            Ok(number)
        }
    }

    fn code_info(&self, address: &Address) -> Result<CodeInfo, WatcherError> {
        match self.cached(|ac| ac.get_code(address))? {
            Some(info) => Ok(info),
            None => codec::decode_code_info(&self.store_read(&keys::code_key(address))?),
        }
    }

    fn transaction_at(block: &RpcBlock, index: u64) -> Result<RpcTransaction, WatcherError> {
        match &block.transactions {
            BlockTransactions::Full(txs) => txs
                .iter()
                .find(|tx| tx.transaction_index == Some(index))
                .cloned()
                .ok_or(WatcherError::NoSuchTransaction),
            BlockTransactions::Hashes(_) => Err(WatcherError::NoSuchTransaction),
        }
    }

    pub fn get_state_from_rpc_db(&self, key: &[u8]) -> Result<Vec<u8>, WatcherError> {
        self.check_enabled()?;
        self.store_read(&keys::rpc_db_key(key))
    }

    pub fn delete_account_from_rpc_db(&self, address: &Address) {
        if !self.enabled() {
            return;
        }
        let key = keys::rpc_db_key(&keys::account_key(address));
        if let Err(e) = self.store.delete(&key) {
            warn!("[qc-18] Failed to drop RPC-db account copy: {}", e);
        }
    }

    pub fn delete_state_from_rpc_db(&self, address: &Address, slot: &[u8]) {
        if !self.enabled() {
            return;
        }
        let key = keys::rpc_db_key(&keys::state_key(address, slot));
        if let Err(e) = self.store.delete(&key) {
            warn!("[qc-18] Failed to drop RPC-db state copy: {}", e);
        }
    }
}

impl FastQueryApi for Querier {
    fn get_transaction_receipt(&self, hash: &Hash) -> Result<TransactionReceipt, WatcherError> {
        self.check_enabled()?;
        codec::decode_json("receipt", &self.read(&keys::receipt_key(hash))?)
    }

    fn get_transaction_by_hash(&self, hash: &Hash) -> Result<RpcTransaction, WatcherError> {
        self.check_enabled()?;
        codec::decode_json("transaction", &self.read(&keys::tx_key(hash))?)
    }

    fn get_block_by_hash(&self, hash: &Hash, full_tx: bool) -> Result<RpcBlock, WatcherError> {
        self.check_enabled()?;
        let mut block: RpcBlock = codec::decode_json("block", &self.read(&keys::block_key(hash))?)?;

        if full_tx {
            if let BlockTransactions::Hashes(hashes) = &block.transactions {
                let txs = hashes
                    .iter()
                    .filter_map(|h| self.get_transaction_by_hash(h).ok())
                    .collect();
                block.transactions = BlockTransactions::Full(txs);
            }
        }
        block.uncle_hash = EMPTY_UNCLE_HASH;
        block.receipts_root = EMPTY_ROOT_HASH;
        Ok(block)
    }

    fn get_block_hash_by_number(&self, number: u64) -> Result<Hash, WatcherError> {
        self.check_enabled()?;
        let height = self.resolve_height(number)?;
        codec::decode_block_hash(&self.read(&keys::block_info_key(height))?)
    }

    fn get_block_by_number(&self, number: u64, full_tx: bool) -> Result<RpcBlock, WatcherError> {
        let hash = self.get_block_hash_by_number(number)?;
        self.get_block_by_hash(&hash, full_tx)
    }

    fn get_transaction_by_block_number_and_index(
        &self,
        number: u64,
        index: u64,
    ) -> Result<RpcTransaction, WatcherError> {
        let block = self.get_block_by_number(number, true)?;
        Self::transaction_at(&block, index)
    }

    fn get_transaction_by_block_hash_and_index(
        &self,
        hash: &Hash,
        index: u64,
    ) -> Result<RpcTransaction, WatcherError> {
        let block = self.get_block_by_hash(hash, true)?;
        Self::transaction_at(&block, index)
    }

    fn get_code(&self, address: &Address, height: u64) -> Result<Vec<u8>, WatcherError> {
        self.check_enabled()?;
        let info = self.code_info(address)?;
        if height > 0 && height < info.height {
            return Err(WatcherError::NotDeployedAtHeight {
                address: to_hex_prefixed(address),
                height,
            });
        }
        info.code_bytes().map_err(|e| WatcherError::decode("code", e))
    }

    fn get_code_by_hash(&self, code_hash: &[u8]) -> Result<Vec<u8>, WatcherError> {
        self.check_enabled()?;
        // A pending delete of the hash must win over the LRU.
        if let Some(code) = self.cached(|ac| ac.get_code_by_hash(code_hash))? {
            return Ok(code);
        }
        let lru_key = code_hash.to_vec();
        if let Some(code) = self.indices.code.get(&lru_key) {
            return Ok(code);
        }
        let seen = self.indices.code.generation();
        let code = self.store_read(&keys::code_hash_key(code_hash))?;
        self.indices.code.fill(seen, lru_key, code.clone());
        Ok(code)
    }

    fn get_latest_block_number(&self) -> Result<u64, WatcherError> {
        self.check_enabled()?;
        match self.cached(|ac| ac.get_latest_block_number())? {
            Some(height) => Ok(height),
            None => codec::decode_height(&self.store_read(&keys::latest_height_key())?),
        }
    }

    fn get_account(&self, address: &Address) -> Result<EthAccount, WatcherError> {
        self.check_enabled()?;
        match self.cached(|ac| ac.get_account(address))? {
            Some(account) => Ok(account),
            None => codec::decode_account(&self.store_read(&keys::account_key(address))?),
        }
    }

    fn get_account_from_rpc_db(&self, address: &Address) -> Result<EthAccount, WatcherError> {
        self.check_enabled()?;
        let key = keys::rpc_db_key(&keys::account_key(address));
        codec::decode_account(&self.store_read(&key)?)
    }

    fn must_get_account(&self, address: &Address) -> Result<EthAccount, WatcherError> {
        match self.get_account(address) {
            Ok(account) => {
                self.delete_account_from_rpc_db(address);
                Ok(account)
            }
            Err(_) => self.get_account_from_rpc_db(address),
        }
    }

    fn get_state(&self, key: &[u8]) -> Result<Vec<u8>, WatcherError> {
        self.check_enabled()?;
        match self.cached(|ac| ac.get_state(key))? {
            Some(value) => Ok(value),
            None => self.store_read(key),
        }
    }

    fn must_get_state(&self, address: &Address, slot: &[u8]) -> Result<Vec<u8>, WatcherError> {
        self.check_enabled()?;
        let key = keys::state_key(address, slot);
        // Taken before any tier is read: a drain that lands after this point
        // refuses our fill below.
        let seen = self.indices.state.generation();

        // Pending epochs are newer than anything the LRU holds.
        let primary = match self.cached(|ac| ac.get_state(&key)) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => match self.indices.state.get(&key) {
                Some(value) => return Ok(value),
                None => self.store_read(&key),
            },
            Err(e) => Err(e),
        };

        let value = match primary {
            Ok(value) => {
                self.delete_state_from_rpc_db(address, slot);
                value
            }
            Err(_) => self.get_state_from_rpc_db(&key)?,
        };
        self.indices.state.fill(seen, key, value.clone());
        Ok(value)
    }

    fn get_params(&self) -> Result<EvmParams, WatcherError> {
        self.check_enabled()?;
        match self.cached(|ac| ac.get_params()) {
            Ok(Some(params)) => return Ok(params),
            Ok(None) => {}
            Err(e) if e.is_not_found() => return Ok(EvmParams::default()),
            Err(e) => return Err(e),
        }

        if let Some(params) = self.indices.params.get() {
            return Ok(params);
        }
        let seen = self.indices.params.generation();
        match self.store.get(&keys::params_key())? {
            Some(bytes) => {
                let params = codec::decode_params(&bytes)?;
                self.indices.params.fill(seen, params.clone());
                Ok(params)
            }
            None => Ok(EvmParams::default()),
        }
    }

    fn has_contract_blocked_list(&self, address: &Address) -> Result<bool, WatcherError> {
        self.check_enabled()?;
        self.store_has(&keys::black_list_key(address))
    }

    fn get_contract_method_blocked_list(
        &self,
        address: &Address,
    ) -> Result<Option<Vec<u8>>, WatcherError> {
        self.check_enabled()?;
        match self.cached(|ac| ac.get_blocked_list_entry(address)) {
            Ok(Some(methods)) => Ok(Some(methods)),
            Ok(None) => Ok(self.store.get(&keys::black_list_key(address))?),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn has_contract_deployment_whitelist(&self, address: &Address) -> Result<bool, WatcherError> {
        self.check_enabled()?;
        self.store_has(&keys::white_list_key(address))
    }
}
