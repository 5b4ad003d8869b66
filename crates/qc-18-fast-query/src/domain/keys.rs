//! # Store Key Namespace
//!
//! Every record kind lives under a one-byte prefix. The layout is shared with
//! existing query databases, so prefixes and identifier encodings must not
//! change.
//!
//! | Prefix | Record | Identifier |
//! |--------|--------|------------|
//! | `0x01` | transaction | tx hash |
//! | `0x02` | block | block hash |
//! | `0x03` | receipt | tx hash |
//! | `0x04` | code | contract address |
//! | `0x05` | block hash by height | decimal height |
//! | `0x06` | latest height | `"LatestHeight"` |
//! | `0x07` | account | address |
//! | `0x08` | state slot | keccak256(address ‖ slot) |
//! | `0x09` | code by hash | code hash |
//! | `0x10` | params | none |
//! | `0x11` | deployment whitelist | address |
//! | `0x12` | blocked list | address |
//! | `0x13` | RPC-db copy | any key above |

use shared_types::{keccak256, Address, Hash};

pub const PREFIX_TX: u8 = 0x01;
pub const PREFIX_BLOCK: u8 = 0x02;
pub const PREFIX_RECEIPT: u8 = 0x03;
pub const PREFIX_CODE: u8 = 0x04;
pub const PREFIX_BLOCK_INFO: u8 = 0x05;
pub const PREFIX_LATEST_HEIGHT: u8 = 0x06;
pub const PREFIX_ACCOUNT: u8 = 0x07;
pub const PREFIX_STATE: u8 = 0x08;
pub const PREFIX_CODE_HASH: u8 = 0x09;
pub const PREFIX_PARAMS: u8 = 0x10;
pub const PREFIX_WHITE_LIST: u8 = 0x11;
pub const PREFIX_BLACK_LIST: u8 = 0x12;
pub const PREFIX_RPC_DB: u8 = 0x13;

pub const KEY_LATEST_HEIGHT: &[u8] = b"LatestHeight";

fn prefixed(prefix: u8, id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + id.len());
    key.push(prefix);
    key.extend_from_slice(id);
    key
}

pub fn tx_key(hash: &Hash) -> Vec<u8> {
    prefixed(PREFIX_TX, hash)
}

pub fn block_key(hash: &Hash) -> Vec<u8> {
    prefixed(PREFIX_BLOCK, hash)
}

pub fn receipt_key(tx_hash: &Hash) -> Vec<u8> {
    prefixed(PREFIX_RECEIPT, tx_hash)
}

pub fn code_key(address: &Address) -> Vec<u8> {
    prefixed(PREFIX_CODE, address)
}

/// Heights are stored as decimal strings, not big-endian integers.
pub fn block_info_key(height: u64) -> Vec<u8> {
    prefixed(PREFIX_BLOCK_INFO, height.to_string().as_bytes())
}

pub fn latest_height_key() -> Vec<u8> {
    prefixed(PREFIX_LATEST_HEIGHT, KEY_LATEST_HEIGHT)
}

pub fn account_key(address: &Address) -> Vec<u8> {
    prefixed(PREFIX_ACCOUNT, address)
}

pub fn state_key(address: &Address, slot: &[u8]) -> Vec<u8> {
    let mut composite = Vec::with_capacity(address.len() + slot.len());
    composite.extend_from_slice(address);
    composite.extend_from_slice(slot);
    prefixed(PREFIX_STATE, &keccak256(&composite))
}

pub fn code_hash_key(code_hash: &[u8]) -> Vec<u8> {
    prefixed(PREFIX_CODE_HASH, code_hash)
}

pub fn params_key() -> Vec<u8> {
    vec![PREFIX_PARAMS]
}

pub fn white_list_key(address: &Address) -> Vec<u8> {
    prefixed(PREFIX_WHITE_LIST, address)
}

pub fn black_list_key(address: &Address) -> Vec<u8> {
    prefixed(PREFIX_BLACK_LIST, address)
}

/// Key of the RPC-db copy of `key`.
pub fn rpc_db_key(key: &[u8]) -> Vec<u8> {
    prefixed(PREFIX_RPC_DB, key)
}
