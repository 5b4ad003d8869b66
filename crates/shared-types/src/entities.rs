//! # Core Domain Entities
//!
//! Chain primitives shared by the fast-query subsystem and the node runtime.
//!
//! ## Clusters
//!
//! - **Identifiers**: `Hash`, `Address`
//! - **Execution Output**: `Log`, `Bloom`, `BlockHeader`
//! - **State**: `EthAccount`, `EvmParams`
//! - **Indexing**: `KeyValue`

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha3::{Digest, Keccak256};

use crate::errors::PrimitiveError;

// Re-export U256 from primitive-types for use across all subsystems
pub use primitive_types::U256;

// =============================================================================
// CLUSTER A: IDENTIFIERS
// =============================================================================

/// A 32-byte Keccak-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte Ethereum-style address.
pub type Address = [u8; 20];

/// Keccak-256 of the empty byte string (code hash of accounts without code).
pub const EMPTY_CODE_HASH: Hash = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lower-case hex with a `0x` prefix.
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a 32-byte hash from hex, with or without the `0x` prefix.
pub fn hash_from_hex(input: &str) -> Result<Hash, PrimitiveError> {
    let raw = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(raw).map_err(|e| PrimitiveError::InvalidHex(e.to_string()))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| PrimitiveError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })
}

// =============================================================================
// CLUSTER B: EXECUTION OUTPUT
// =============================================================================

/// Size of an Ethereum logs bloom in bytes.
pub const BLOOM_BYTE_LENGTH: usize = 256;

/// 2048-bit logs bloom filter.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bloom(#[serde_as(as = "Bytes")] pub [u8; BLOOM_BYTE_LENGTH]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0u8; BLOOM_BYTE_LENGTH])
    }
}

impl std::fmt::Debug for Bloom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bloom({})", to_hex_prefixed(&self.0))
    }
}

impl Bloom {
    /// Builds the bloom of a set of logs (addresses and topics).
    pub fn from_logs(logs: &[Log]) -> Self {
        let mut bloom = Self::default();
        for log in logs {
            bloom.accrue(&log.address);
            for topic in &log.topics {
                bloom.accrue(topic);
            }
        }
        bloom
    }

    /// Sets the three bits selected by `keccak256(input)`.
    pub fn accrue(&mut self, input: &[u8]) {
        for (byte, mask) in Self::positions(input) {
            self.0[byte] |= mask;
        }
    }

    /// Returns true if every bit for `input` is set (false positives possible).
    pub fn contains_input(&self, input: &[u8]) -> bool {
        Self::positions(input)
            .into_iter()
            .all(|(byte, mask)| self.0[byte] & mask == mask)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    fn positions(input: &[u8]) -> [(usize, u8); 3] {
        let hash = keccak256(input);
        let mut out = [(0usize, 0u8); 3];
        for (slot, i) in [0usize, 2, 4].into_iter().enumerate() {
            let bit = ((usize::from(hash[i]) << 8) | usize::from(hash[i + 1])) & 2047;
            out[slot] = (BLOOM_BYTE_LENGTH - 1 - bit / 8, 1u8 << (bit % 8));
        }
        out
    }
}

/// An EVM log emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Log {
    /// Contract that emitted the log.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<Hash>,
    /// Non-indexed payload.
    pub data: Vec<u8>,
    pub block_number: u64,
    pub tx_hash: Hash,
    pub tx_index: u64,
    pub block_hash: Hash,
    /// Position of the log within the block.
    pub log_index: u64,
    /// True if the log was reverted by a chain reorganization.
    pub removed: bool,
}

/// Consensus header of the block being executed.
///
/// Only the fields the query layer needs to render an Ethereum block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Block height in the chain.
    pub height: u64,
    /// Unix timestamp (seconds) when the block was proposed.
    pub time: u64,
    /// Hash of the previous block.
    pub last_block_hash: Hash,
    /// Merkle root of the block's transactions.
    pub data_hash: Hash,
    /// Application state root after the previous block.
    pub app_hash: Hash,
    /// Validator that proposed the block.
    pub proposer_address: Address,
}

// =============================================================================
// CLUSTER C: STATE
// =============================================================================

/// An EVM-compatible account snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthAccount {
    pub address: Address,
    /// Balance in the smallest denomination.
    pub balance: U256,
    pub nonce: u64,
    /// Chain-assigned account number.
    pub account_number: u64,
    /// Keccak-256 of the account's code (`EMPTY_CODE_HASH` for EOAs).
    pub code_hash: Hash,
}

impl EthAccount {
    /// Creates an externally owned account with zero balance.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balance: U256::zero(),
            nonce: 0,
            account_number: 0,
            code_hash: EMPTY_CODE_HASH,
        }
    }

    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_code_hash(mut self, code_hash: Hash) -> Self {
        self.code_hash = code_hash;
        self
    }

    /// True if the account carries contract code.
    pub fn is_contract(&self) -> bool {
        self.code_hash != EMPTY_CODE_HASH
    }
}

/// EVM module parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmParams {
    /// Whether contract creation is enabled.
    pub enable_create: bool,
    /// Whether contract calls are enabled.
    pub enable_call: bool,
    /// Additional EIPs activated on top of the base fork.
    pub extra_eips: Vec<i64>,
    /// Restrict deployment to whitelisted deployers.
    pub enable_contract_deployment_whitelist: bool,
    /// Reject calls to blocked contracts.
    pub enable_contract_blocked_list: bool,
    /// Per-transaction gas cap.
    pub max_gas_limit_per_tx: u64,
}

impl Default for EvmParams {
    fn default() -> Self {
        Self {
            enable_create: true,
            enable_call: true,
            extra_eips: Vec::new(),
            enable_contract_deployment_whitelist: false,
            enable_contract_blocked_list: false,
            max_gas_limit_per_tx: 30_000_000,
        }
    }
}

// =============================================================================
// CLUSTER D: INDEXING
// =============================================================================

/// A raw key/value pair destined for a secondary index (e.g. the bloom indexer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
