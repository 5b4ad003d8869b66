//! Value encodings per record kind.
//!
//! Accounts use the binary codec, params and RPC records use JSON, heights are
//! decimal strings and block-info values are `0x`-prefixed hashes. Both the
//! message constructors and the readers go through these functions so a value
//! written by one node decodes identically on a replica.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{hash_from_hex, EthAccount, EvmParams, Hash};

use super::errors::WatcherError;
use super::records::CodeInfo;

pub fn encode_json<T: Serialize>(kind: &'static str, value: &T) -> Result<Vec<u8>, WatcherError> {
    serde_json::to_vec(value).map_err(|e| WatcherError::encode(kind, e))
}

pub fn decode_json<T: DeserializeOwned>(kind: &'static str, bytes: &[u8]) -> Result<T, WatcherError> {
    serde_json::from_slice(bytes).map_err(|e| WatcherError::decode(kind, e))
}

pub fn encode_account(account: &EthAccount) -> Result<Vec<u8>, WatcherError> {
    bincode::serialize(account).map_err(|e| WatcherError::encode("account", e))
}

pub fn decode_account(bytes: &[u8]) -> Result<EthAccount, WatcherError> {
    bincode::deserialize(bytes).map_err(|e| WatcherError::decode("account", e))
}

pub fn encode_params(params: &EvmParams) -> Result<Vec<u8>, WatcherError> {
    encode_json("params", params)
}

pub fn decode_params(bytes: &[u8]) -> Result<EvmParams, WatcherError> {
    decode_json("params", bytes)
}

pub fn decode_code_info(bytes: &[u8]) -> Result<CodeInfo, WatcherError> {
    decode_json("code", bytes)
}

pub fn encode_height(height: u64) -> Vec<u8> {
    height.to_string().into_bytes()
}

pub fn decode_height(bytes: &[u8]) -> Result<u64, WatcherError> {
    std::str::from_utf8(bytes)
        .map_err(|e| WatcherError::decode("height", e))?
        .parse::<u64>()
        .map_err(|e| WatcherError::decode("height", e))
}

pub fn encode_block_hash(hash: &Hash) -> Vec<u8> {
    shared_types::to_hex_prefixed(hash).into_bytes()
}

pub fn decode_block_hash(bytes: &[u8]) -> Result<Hash, WatcherError> {
    let text = std::str::from_utf8(bytes).map_err(|e| WatcherError::decode("block hash", e))?;
    hash_from_hex(text).map_err(|e| WatcherError::decode("block hash", e))
}
