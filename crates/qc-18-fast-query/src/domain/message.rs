//! # Watch Messages
//!
//! The unit of mutation recorded during block execution.
//!
//! `WatchMessage` is a closed enum: every record kind the query store knows
//! about is one variant, and each variant knows its store key, its encoded
//! value and its `OperationKind`. `Batch` is the flattened wire form used
//! whenever a delta crosses a process boundary; a receiver only needs the
//! kind tag to interpret the value.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use shared_types::{Address, EthAccount, EvmParams, Hash};

use super::codec;
use super::errors::WatcherError;
use super::keys;
use super::records::{CodeInfo, RpcBlock, RpcTransaction, TransactionReceipt};

/// What applying a message does to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
#[repr(u32)]
pub enum OperationKind {
    /// Plain set of a record.
    Set = 1,
    /// Set of a storage slot; also refreshes the state LRU.
    SetState = 2,
    /// Removal. Carries no value; reads must report "not present".
    Delete = 3,
    /// Set of the EVM params; also refreshes the cached params.
    SetParams = 4,
}

impl From<OperationKind> for u32 {
    fn from(kind: OperationKind) -> Self {
        kind as u32
    }
}

impl TryFrom<u32> for OperationKind {
    type Error = WatcherError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OperationKind::Set),
            2 => Ok(OperationKind::SetState),
            3 => Ok(OperationKind::Delete),
            4 => Ok(OperationKind::SetParams),
            other => Err(WatcherError::UnknownOperationKind(other)),
        }
    }
}

impl OperationKind {
    pub fn is_delete(self) -> bool {
        self == OperationKind::Delete
    }
}

/// Codec-agnostic `{key, value, kind}` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    #[serde(rename = "type_value")]
    pub kind: OperationKind,
}

impl Batch {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, kind: OperationKind) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind,
        }
    }

    /// A delete marker for `key`.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self::new(key, Vec::new(), OperationKind::Delete)
    }
}

impl From<&WatchMessage> for Batch {
    fn from(msg: &WatchMessage) -> Self {
        Batch {
            key: msg.key(),
            value: msg.value().into_owned(),
            kind: msg.kind(),
        }
    }
}

/// A typed mutation produced during block execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMessage {
    Transaction { hash: Hash, encoded: Vec<u8> },
    Block { hash: Hash, encoded: Vec<u8> },
    /// Height → block hash index.
    BlockInfo { height: u64, hash: Hash },
    Receipt { tx_hash: Hash, encoded: Vec<u8> },
    Code { address: Address, info: CodeInfo, encoded: Vec<u8> },
    CodeByHash { hash: Vec<u8>, code: Vec<u8> },
    Account { account: EthAccount, encoded: Vec<u8> },
    DeleteAccount { address: Address },
    State { key: Vec<u8>, value: Vec<u8> },
    Params { params: EvmParams, encoded: Vec<u8> },
    ContractBlockedListItem { address: Address },
    ContractMethodBlockedListItem { address: Address, methods: Vec<u8> },
    ContractDeploymentWhitelistItem { address: Address },
    LatestHeight { height: u64 },
    /// Replicated or otherwise untyped delta.
    Batch(Batch),
    /// Materialized delete of an arbitrary key.
    Tombstone { key: Vec<u8> },
}

impl WatchMessage {
    // === Constructors ===

    pub fn transaction(tx: &RpcTransaction) -> Result<Self, WatcherError> {
        Ok(WatchMessage::Transaction {
            hash: tx.hash,
            encoded: codec::encode_json("transaction", tx)?,
        })
    }

    pub fn block(block: &RpcBlock) -> Result<Self, WatcherError> {
        Ok(WatchMessage::Block {
            hash: block.hash,
            encoded: codec::encode_json("block", block)?,
        })
    }

    pub fn block_info(height: u64, hash: Hash) -> Self {
        WatchMessage::BlockInfo { height, hash }
    }

    pub fn receipt(receipt: &TransactionReceipt) -> Result<Self, WatcherError> {
        Ok(WatchMessage::Receipt {
            tx_hash: receipt.transaction_hash,
            encoded: codec::encode_json("receipt", receipt)?,
        })
    }

    pub fn code(address: Address, code: &[u8], height: u64) -> Result<Self, WatcherError> {
        let info = CodeInfo::new(height, code);
        let encoded = codec::encode_json("code", &info)?;
        Ok(WatchMessage::Code {
            address,
            info,
            encoded,
        })
    }

    pub fn code_by_hash(hash: impl Into<Vec<u8>>, code: impl Into<Vec<u8>>) -> Self {
        WatchMessage::CodeByHash {
            hash: hash.into(),
            code: code.into(),
        }
    }

    pub fn account(account: EthAccount) -> Result<Self, WatcherError> {
        let encoded = codec::encode_account(&account)?;
        Ok(WatchMessage::Account { account, encoded })
    }

    pub fn delete_account(address: Address) -> Self {
        WatchMessage::DeleteAccount { address }
    }

    pub fn state(address: &Address, slot: &[u8], value: impl Into<Vec<u8>>) -> Self {
        WatchMessage::State {
            key: keys::state_key(address, slot),
            value: value.into(),
        }
    }

    pub fn params(params: EvmParams) -> Result<Self, WatcherError> {
        let encoded = codec::encode_params(&params)?;
        Ok(WatchMessage::Params { params, encoded })
    }

    pub fn contract_blocked_list_item(address: Address) -> Self {
        WatchMessage::ContractBlockedListItem { address }
    }

    pub fn contract_method_blocked_list_item(address: Address, methods: impl Into<Vec<u8>>) -> Self {
        WatchMessage::ContractMethodBlockedListItem {
            address,
            methods: methods.into(),
        }
    }

    pub fn contract_deployment_whitelist_item(address: Address) -> Self {
        WatchMessage::ContractDeploymentWhitelistItem { address }
    }

    pub fn latest_height(height: u64) -> Self {
        WatchMessage::LatestHeight { height }
    }

    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        WatchMessage::Tombstone { key: key.into() }
    }

    /// Lifts a wire delta. A `Delete` batch becomes a tombstone.
    pub fn from_batch(batch: Batch) -> Self {
        if batch.kind.is_delete() {
            WatchMessage::Tombstone { key: batch.key }
        } else {
            WatchMessage::Batch(batch)
        }
    }

    // === Capabilities ===

    /// Store key of this record.
    pub fn key(&self) -> Vec<u8> {
        match self {
            WatchMessage::Transaction { hash, .. } => keys::tx_key(hash),
            WatchMessage::Block { hash, .. } => keys::block_key(hash),
            WatchMessage::BlockInfo { height, .. } => keys::block_info_key(*height),
            WatchMessage::Receipt { tx_hash, .. } => keys::receipt_key(tx_hash),
            WatchMessage::Code { address, .. } => keys::code_key(address),
            WatchMessage::CodeByHash { hash, .. } => keys::code_hash_key(hash),
            WatchMessage::Account { account, .. } => keys::account_key(&account.address),
            WatchMessage::DeleteAccount { address } => keys::account_key(address),
            WatchMessage::State { key, .. } => key.clone(),
            WatchMessage::Params { .. } => keys::params_key(),
            WatchMessage::ContractBlockedListItem { address }
            | WatchMessage::ContractMethodBlockedListItem { address, .. } => {
                keys::black_list_key(address)
            }
            WatchMessage::ContractDeploymentWhitelistItem { address } => {
                keys::white_list_key(address)
            }
            WatchMessage::LatestHeight { .. } => keys::latest_height_key(),
            WatchMessage::Batch(batch) => batch.key.clone(),
            WatchMessage::Tombstone { key } => key.clone(),
        }
    }

    /// Encoded value as written to the store. Empty for deletes and for
    /// list-membership entries.
    pub fn value(&self) -> Cow<'_, [u8]> {
        match self {
            WatchMessage::Transaction { encoded, .. }
            | WatchMessage::Block { encoded, .. }
            | WatchMessage::Receipt { encoded, .. }
            | WatchMessage::Code { encoded, .. }
            | WatchMessage::Account { encoded, .. }
            | WatchMessage::Params { encoded, .. } => Cow::Borrowed(encoded),
            WatchMessage::BlockInfo { hash, .. } => Cow::Owned(codec::encode_block_hash(hash)),
            WatchMessage::CodeByHash { code, .. } => Cow::Borrowed(code),
            WatchMessage::State { value, .. } => Cow::Borrowed(value),
            WatchMessage::ContractMethodBlockedListItem { methods, .. } => Cow::Borrowed(methods),
            WatchMessage::LatestHeight { height } => Cow::Owned(codec::encode_height(*height)),
            WatchMessage::Batch(batch) => Cow::Borrowed(&batch.value),
            WatchMessage::DeleteAccount { .. }
            | WatchMessage::ContractBlockedListItem { .. }
            | WatchMessage::ContractDeploymentWhitelistItem { .. }
            | WatchMessage::Tombstone { .. } => Cow::Borrowed(&[]),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            WatchMessage::DeleteAccount { .. } | WatchMessage::Tombstone { .. } => {
                OperationKind::Delete
            }
            WatchMessage::State { .. } => OperationKind::SetState,
            WatchMessage::Params { .. } => OperationKind::SetParams,
            WatchMessage::Batch(batch) => batch.kind,
            _ => OperationKind::Set,
        }
    }

    /// Short name of the record kind, used in logs and `WrongType` errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            WatchMessage::Transaction { .. } => "transaction",
            WatchMessage::Block { .. } => "block",
            WatchMessage::BlockInfo { .. } => "block info",
            WatchMessage::Receipt { .. } => "receipt",
            WatchMessage::Code { .. } => "code",
            WatchMessage::CodeByHash { .. } => "code by hash",
            WatchMessage::Account { .. } => "account",
            WatchMessage::DeleteAccount { .. } => "account deletion",
            WatchMessage::State { .. } => "state",
            WatchMessage::Params { .. } => "params",
            WatchMessage::ContractBlockedListItem { .. } => "blocked list item",
            WatchMessage::ContractMethodBlockedListItem { .. } => "method blocked list item",
            WatchMessage::ContractDeploymentWhitelistItem { .. } => "whitelist item",
            WatchMessage::LatestHeight { .. } => "latest height",
            WatchMessage::Batch(_) => "batch",
            WatchMessage::Tombstone { .. } => "tombstone",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind_wire_values() {
        assert_eq!(u32::from(OperationKind::Set), 1);
        assert_eq!(u32::from(OperationKind::SetState), 2);
        assert_eq!(u32::from(OperationKind::Delete), 3);
        assert_eq!(u32::from(OperationKind::SetParams), 4);
        assert!(matches!(
            OperationKind::try_from(9),
            Err(WatcherError::UnknownOperationKind(9))
        ));
    }

    #[test]
    fn test_delete_variants_carry_no_value() {
        let del = WatchMessage::delete_account([0x01; 20]);
        assert_eq!(del.kind(), OperationKind::Delete);
        assert!(del.value().is_empty());
        assert_eq!(del.key(), keys::account_key(&[0x01; 20]));
    }

    #[test]
    fn test_method_blocked_item_shares_blocked_list_key() {
        let addr = [0x07; 20];
        let plain = WatchMessage::contract_blocked_list_item(addr);
        let methods = WatchMessage::contract_method_blocked_list_item(addr, b"transfer".to_vec());
        assert_eq!(plain.key(), methods.key());
        assert!(plain.value().is_empty());
        assert_eq!(methods.value().as_ref(), b"transfer");
    }

    #[test]
    fn test_latest_height_value_is_decimal() {
        let msg = WatchMessage::latest_height(77);
        assert_eq!(msg.value().as_ref(), b"77");
        assert_eq!(msg.key(), keys::latest_height_key());
    }

    #[test]
    fn test_batch_flattening_keeps_kind() {
        let msg = WatchMessage::state(&[0x01; 20], &[0x02; 32], vec![0x03]);
        let batch = Batch::from(&msg);
        assert_eq!(batch.kind, OperationKind::SetState);
        assert_eq!(batch.key, msg.key());
        assert_eq!(batch.value, vec![0x03]);
    }

    #[test]
    fn test_from_batch_turns_delete_into_tombstone() {
        let msg = WatchMessage::from_batch(Batch::delete(vec![0x07, 0x01]));
        assert_eq!(msg, WatchMessage::tombstone(vec![0x07, 0x01]));

        let set = WatchMessage::from_batch(Batch::new(vec![0x04], vec![0x01], OperationKind::Set));
        assert!(matches!(set, WatchMessage::Batch(_)));
    }

    #[test]
    fn test_batch_json_uses_numeric_kind() {
        let batch = Batch::new(vec![0x01], vec![0x02], OperationKind::SetState);
        let json = serde_json::to_string(&batch).unwrap();
        assert!(json.contains("\"type_value\":2"));
        let decoded: Batch = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, batch);
    }
}
