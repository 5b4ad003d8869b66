//! # Inbound Ports (Driving Ports)
//!
//! Read API consumed by the JSON-RPC handlers.
//!
//! Every method returns `WatcherError::Disabled` while the subsystem is
//! switched off and `WatcherError::NotFound` for records that do not exist
//! (a pending delete counts as not existing).

use shared_types::{Address, EthAccount, EvmParams, Hash};

use crate::domain::errors::WatcherError;
use crate::domain::records::{RpcBlock, RpcTransaction, TransactionReceipt};

/// Fast-query read API.
pub trait FastQueryApi: Send + Sync {
    fn get_transaction_receipt(&self, hash: &Hash) -> Result<TransactionReceipt, WatcherError>;

    fn get_transaction_by_hash(&self, hash: &Hash) -> Result<RpcTransaction, WatcherError>;

    /// With `full_tx` the hash list is expanded into transaction objects;
    /// hashes that cannot be resolved are skipped.
    fn get_block_by_hash(&self, hash: &Hash, full_tx: bool) -> Result<RpcBlock, WatcherError>;

    /// `number == 0` resolves to the latest height.
    fn get_block_hash_by_number(&self, number: u64) -> Result<Hash, WatcherError>;

    /// `number == 0` resolves to the latest height.
    fn get_block_by_number(&self, number: u64, full_tx: bool) -> Result<RpcBlock, WatcherError>;

    fn get_transaction_by_block_number_and_index(
        &self,
        number: u64,
        index: u64,
    ) -> Result<RpcTransaction, WatcherError>;

    fn get_transaction_by_block_hash_and_index(
        &self,
        hash: &Hash,
        index: u64,
    ) -> Result<RpcTransaction, WatcherError>;

    /// Code of `address` as seen at `height`.
    ///
    /// ## Errors
    ///
    /// - `NotDeployedAtHeight`: `height` is non-zero and below the
    ///   deployment height
    fn get_code(&self, address: &Address, height: u64) -> Result<Vec<u8>, WatcherError>;

    fn get_code_by_hash(&self, code_hash: &[u8]) -> Result<Vec<u8>, WatcherError>;

    fn get_latest_block_number(&self) -> Result<u64, WatcherError>;

    fn get_account(&self, address: &Address) -> Result<EthAccount, WatcherError>;

    fn get_account_from_rpc_db(&self, address: &Address) -> Result<EthAccount, WatcherError>;

    /// Primary copy first, then the RPC-db copy. A primary hit removes the
    /// now redundant RPC-db copy.
    fn must_get_account(&self, address: &Address) -> Result<EthAccount, WatcherError>;

    /// `key` is the full state key.
    fn get_state(&self, key: &[u8]) -> Result<Vec<u8>, WatcherError>;

    /// State LRU, then the primary copy, then the RPC-db copy.
    fn must_get_state(&self, address: &Address, slot: &[u8]) -> Result<Vec<u8>, WatcherError>;

    /// Default params when none were ever stored.
    fn get_params(&self) -> Result<EvmParams, WatcherError>;

    fn has_contract_blocked_list(&self, address: &Address) -> Result<bool, WatcherError>;

    /// Method list of a blocked contract; `None` when the contract is not
    /// listed.
    fn get_contract_method_blocked_list(
        &self,
        address: &Address,
    ) -> Result<Option<Vec<u8>>, WatcherError>;

    fn has_contract_deployment_whitelist(&self, address: &Address) -> Result<bool, WatcherError>;
}
