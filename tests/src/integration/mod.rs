//! # Integration Tests
//!
//! Shared fixtures for driving a `WatcherTx` through whole blocks.

pub mod concurrency;
pub mod flows;

use qc_18_fast_query::{EthereumTx, ResultData, WatcherTx, TRANSACTION_SUCCESS};
use shared_types::{Address, BlockHeader, Bloom, EthAccount, Hash, U256};

pub fn block_hash(height: u64) -> Hash {
    let mut hash = [0xB1; 32];
    hash[24..].copy_from_slice(&height.to_be_bytes());
    hash
}

pub fn tx_hash(height: u64, index: u64) -> Hash {
    let mut hash = [0x7A; 32];
    hash[..8].copy_from_slice(&height.to_be_bytes());
    hash[8..16].copy_from_slice(&index.to_be_bytes());
    hash
}

pub fn transfer(from: Address, nonce: u64) -> EthereumTx {
    EthereumTx {
        from,
        to: Some([0xEE; 20]),
        nonce,
        gas_limit: 21_000,
        gas_price: U256::from(1_000_000_000u64),
        value: U256::from(1u64),
        input: vec![],
        v: U256::from(27u64),
        r: U256::one(),
        s: U256::one(),
    }
}

/// Runs one block the way the executor does: transactions and receipts,
/// account updates in the stale batch, then block, finalize and commit.
pub fn execute_block(watcher: &mut WatcherTx, height: u64, txs: u64) {
    let header = BlockHeader {
        height,
        time: 1_700_000_000 + height,
        ..Default::default()
    };
    watcher.new_height(height, block_hash(height), header);

    let sender = [0x5E; 20];
    for index in 0..txs {
        let nonce = height * 100 + index;
        let tx = transfer(sender, nonce);
        let hash = tx_hash(height, index);
        watcher.save_ethereum_tx(&tx, hash, index);
        watcher.save_transaction_receipt(
            TRANSACTION_SUCCESS,
            &tx,
            hash,
            index,
            &ResultData::default(),
            21_000,
        );
        watcher.save_account(EthAccount::new(sender).with_nonce(nonce + 1), false);
    }

    watcher.save_block(Bloom::default());
    watcher.finalize();
    watcher
        .commit()
        .unwrap_or_else(|e| panic!("commit at height {height} failed: {e}"));
}
