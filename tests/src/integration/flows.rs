//! # Fast-Query Flows
//!
//! End-to-end runs of the producer, the persistence worker and the querier
//! over shared stores.
//!
//! ## Flows Tested
//!
//! 1. **Async commit**: every block is readable as soon as `commit` returns,
//!    and still readable after the worker has drained it.
//! 2. **Mode equivalence**: sync and async commit leave identical stores.
//! 3. **Replication**: a replica fed only with `WatchData` converges to the
//!    producer's store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use qc_18_fast_query::{
        keys, FastQuery, FastQueryApi, FastQueryConfig, InMemoryWatchStore, WatchData, WatchStore,
        WireCodec,
    };

    use crate::integration::{block_hash, execute_block, tx_hash};

    const SENDER: [u8; 20] = [0x5E; 20];

    fn build(config: FastQueryConfig) -> (FastQuery, Arc<InMemoryWatchStore>) {
        let store = Arc::new(InMemoryWatchStore::new());
        let fq = FastQuery::build(config, store.clone(), None).unwrap();
        (fq, store)
    }

    // =============================================================================
    // ASYNC COMMIT
    // =============================================================================

    #[test]
    fn test_async_blocks_readable_before_and_after_drain() {
        let config = FastQueryConfig::enabled()
            .with_async_commit(true)
            .with_commit_gap_height(4);
        let (FastQuery { mut watcher, querier }, store) = build(config);

        for height in 1..=20 {
            execute_block(&mut watcher, height, 3);

            assert_eq!(querier.get_latest_block_number().unwrap(), height);
            let receipt = querier.get_transaction_receipt(&tx_hash(height, 2)).unwrap();
            assert_eq!(receipt.cumulative_gas_used, 63_000);
            assert_eq!(receipt.block_hash, block_hash(height));
            let account = querier.get_account(&SENDER).unwrap();
            assert_eq!(account.nonce, height * 100 + 3);
        }

        watcher.close();
        assert_eq!(watcher.processor().pending_epochs(), 0);
        assert_eq!(
            store.get(&keys::latest_height_key()).unwrap(),
            Some(b"20".to_vec())
        );

        for height in 1..=20 {
            let block = querier.get_block_by_number(height, false).unwrap();
            assert_eq!(block.hash, block_hash(height));
            let tx = querier
                .get_transaction_by_block_hash_and_index(&block_hash(height), 1)
                .unwrap();
            assert_eq!(tx.hash, tx_hash(height, 1));
        }
    }

    #[test]
    fn test_sync_and_async_leave_identical_stores() {
        let (FastQuery { watcher: mut sync, .. }, sync_store) = build(FastQueryConfig::enabled());
        let (FastQuery { watcher: mut async_, .. }, async_store) =
            build(FastQueryConfig::enabled().with_async_commit(true));

        for height in 1..=10 {
            execute_block(&mut sync, height, 2);
            execute_block(&mut async_, height, 2);
        }
        sync.close();
        async_.close();

        assert!(!sync_store.is_empty());
        assert_eq!(sync_store.dump(), async_store.dump());
    }

    // =============================================================================
    // REPLICATION
    // =============================================================================

    #[test]
    fn test_replica_converges_from_watch_data() {
        let (FastQuery { watcher: mut producer, .. }, producer_store) =
            build(FastQueryConfig::enabled().with_async_commit(true));
        let (FastQuery { watcher: mut replica, querier }, replica_store) =
            build(FastQueryConfig::enabled());

        let mut all_keys = Vec::new();
        for height in 1..=8 {
            execute_block(&mut producer, height, 2);
            let bytes = (producer.get_watch_data_func())().unwrap();

            let data = replica.unmarshal_watch_data(&bytes).unwrap();
            // 2 txs, 2 receipts, 1 account (deduplicated), block, height index, latest height
            assert_eq!(data.size(), 8);
            all_keys.extend(data.batch_keys());
            replica.use_watch_data(data).unwrap();
        }
        producer.close();
        replica.close();

        assert_eq!(producer_store.dump(), replica_store.dump());
        assert_eq!(
            producer.check_watch_db(&all_keys, "producer"),
            replica.check_watch_db(&all_keys, "consumer")
        );
        assert_eq!(querier.get_latest_block_number().unwrap(), 8);
    }

    #[test]
    fn test_json_envelope_replays_like_binary() {
        let (FastQuery { watcher: mut producer, .. }, _) = build(FastQueryConfig::enabled());
        let (FastQuery { watcher: mut replica, querier }, _) = build(FastQueryConfig::enabled());

        execute_block(&mut producer, 1, 1);
        let binary = (producer.get_watch_data_func())().unwrap();
        let data = WatchData::decode(&binary).unwrap();

        let json = data.encode(WireCodec::Json).unwrap();
        assert_eq!(json.first(), Some(&b'{'));
        let decoded = replica.unmarshal_watch_data(&json).unwrap();
        assert_eq!(decoded, data);

        replica.use_watch_data(decoded).unwrap();
        replica.close();
        assert_eq!(querier.get_latest_block_number().unwrap(), 1);
        assert!(querier.get_transaction_by_hash(&tx_hash(1, 0)).is_ok());
    }
}
