//! # Query Records
//!
//! The Ethereum-shaped records served to JSON-RPC clients, plus the
//! execution inputs the producer builds them from.

use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockHeader, Bloom, Hash, Log, U256};

/// Gas limit reported for every block.
pub const BLOCK_GAS_LIMIT: u64 = 0xffff_ffff;

/// Receipt status of a successful transaction.
pub const TRANSACTION_SUCCESS: u64 = 1;
/// Receipt status of a reverted transaction.
pub const TRANSACTION_FAILED: u64 = 0;

/// keccak256(rlp([])), reported as `sha3Uncles`.
pub const EMPTY_UNCLE_HASH: Hash = [
    0x1d, 0xcc, 0x4d, 0xe8, 0xde, 0xc7, 0x5d, 0x7a, 0xab, 0x85, 0xb5, 0x67, 0xb6, 0xcc, 0xd4, 0x1a,
    0xd3, 0x12, 0x45, 0x1b, 0x94, 0x8a, 0x74, 0x13, 0xf0, 0xa1, 0x42, 0xfd, 0x40, 0xd4, 0x93, 0x47,
];

/// Root of an empty trie, reported as `receiptsRoot`.
pub const EMPTY_ROOT_HASH: Hash = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];

// =============================================================================
// EXECUTION INPUTS
// =============================================================================

/// An EVM transaction as seen by the block executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthereumTx {
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub value: U256,
    pub input: Vec<u8>,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

/// Execution output of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResultData {
    /// Created contract, all-zero when nothing was deployed.
    pub contract_address: Address,
    pub bloom: Bloom,
    pub logs: Vec<Log>,
    pub ret: Vec<u8>,
}

// =============================================================================
// QUERY RECORDS
// =============================================================================

/// Contract code stored by address, tagged with its deployment height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeInfo {
    pub height: u64,
    /// Hex-encoded code.
    pub code: String,
}

impl CodeInfo {
    pub fn new(height: u64, code: &[u8]) -> Self {
        Self {
            height,
            code: hex::encode(code),
        }
    }

    pub fn code_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.code)
    }
}

/// A transaction returned to RPC clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub block_hash: Option<Hash>,
    pub block_number: Option<u64>,
    pub from: Address,
    pub gas: u64,
    pub gas_price: U256,
    pub hash: Hash,
    pub input: Vec<u8>,
    pub nonce: u64,
    pub to: Option<Address>,
    pub transaction_index: Option<u64>,
    pub value: U256,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

impl RpcTransaction {
    /// Places `tx` at `index` inside the block `block_hash` at `height`.
    pub fn new(tx: &EthereumTx, hash: Hash, block_hash: Hash, height: u64, index: u64) -> Self {
        Self {
            block_hash: Some(block_hash),
            block_number: Some(height),
            from: tx.from,
            gas: tx.gas_limit,
            gas_price: tx.gas_price,
            hash,
            input: tx.input.clone(),
            nonce: tx.nonce,
            to: tx.to,
            transaction_index: Some(index),
            value: tx.value,
            v: tx.v,
            r: tx.r,
            s: tx.s,
        }
    }
}

/// A transaction receipt returned to RPC clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub status: u64,
    pub cumulative_gas_used: u64,
    pub logs_bloom: Bloom,
    pub logs: Vec<Log>,
    pub transaction_hash: Hash,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub block_hash: Hash,
    pub block_number: u64,
    pub transaction_index: u64,
    pub from: Address,
    pub to: Option<Address>,
}

impl TransactionReceipt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        status: u64,
        tx: &EthereumTx,
        tx_hash: Hash,
        block_hash: Hash,
        tx_index: u64,
        height: u64,
        data: &ResultData,
        cumulative_gas_used: u64,
        gas_used: u64,
    ) -> Self {
        // A failed deployment reports the zero address; RPC clients expect null.
        let contract_address = if data.contract_address == [0u8; 20] {
            None
        } else {
            Some(data.contract_address)
        };

        Self {
            status,
            cumulative_gas_used,
            logs_bloom: data.bloom,
            logs: data.logs.clone(),
            transaction_hash: tx_hash,
            contract_address,
            gas_used,
            block_hash,
            block_number: height,
            transaction_index: tx_index,
            from: tx.from,
            to: tx.to,
        }
    }
}

/// Transactions of a block: hashes as stored, full objects on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
    Hashes(Vec<Hash>),
    Full(Vec<RpcTransaction>),
}

impl Default for BlockTransactions {
    fn default() -> Self {
        BlockTransactions::Hashes(Vec::new())
    }
}

/// A block returned to RPC clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: u64,
    pub hash: Hash,
    pub parent_hash: Hash,
    pub nonce: u64,
    #[serde(rename = "sha3Uncles")]
    pub uncle_hash: Hash,
    pub logs_bloom: Bloom,
    pub transactions_root: Hash,
    pub state_root: Hash,
    pub miner: Address,
    pub mix_hash: Hash,
    pub difficulty: u64,
    pub total_difficulty: u64,
    pub extra_data: Vec<u8>,
    pub size: u64,
    pub gas_limit: u64,
    pub gas_used: U256,
    pub timestamp: u64,
    pub uncles: Vec<Hash>,
    pub receipts_root: Hash,
    pub transactions: BlockTransactions,
}

impl RpcBlock {
    /// Renders the consensus header of block `hash` as an Ethereum block.
    pub fn new(
        hash: Hash,
        header: &BlockHeader,
        bloom: Bloom,
        gas_used: u64,
        tx_hashes: Vec<Hash>,
    ) -> Self {
        Self {
            number: header.height,
            hash,
            parent_hash: header.last_block_hash,
            nonce: 0,
            uncle_hash: [0u8; 32],
            logs_bloom: bloom,
            transactions_root: header.data_hash,
            state_root: header.app_hash,
            miner: header.proposer_address,
            mix_hash: [0u8; 32],
            difficulty: 0,
            total_difficulty: 0,
            extra_data: Vec::new(),
            size: bincode::serialized_size(header).unwrap_or(0),
            gas_limit: BLOCK_GAS_LIMIT,
            gas_used: U256::from(gas_used),
            timestamp: header.time,
            uncles: Vec::new(),
            receipts_root: [0u8; 32],
            transactions: BlockTransactions::Hashes(tx_hashes),
        }
    }
}
