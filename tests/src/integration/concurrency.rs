//! # Concurrent Reads
//!
//! RPC readers run on their own threads while the producer seals epochs and
//! the worker drains them. Readers must never see a committed record vanish,
//! the latest height go backwards, or a storage slot fall behind the last
//! sealed epoch.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;

    use qc_18_fast_query::{FastQuery, FastQueryApi, FastQueryConfig, InMemoryWatchStore};
    use rand::Rng;

    use crate::integration::{execute_block, tx_hash};

    const BLOCKS: u64 = 200;
    const READERS: usize = 4;

    #[test]
    fn test_readers_racing_seal_and_drain() {
        let store = Arc::new(InMemoryWatchStore::new());
        let config = FastQueryConfig::enabled()
            .with_async_commit(true)
            .with_commit_gap_height(8);
        let FastQuery {
            mut watcher,
            querier,
        } = FastQuery::build(config, store, None).unwrap();

        execute_block(&mut watcher, 1, 1);
        let committed = Arc::new(AtomicU64::new(1));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let querier = querier.clone();
                let committed = committed.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    let mut last_seen = 0;
                    let mut reads = 0u64;
                    while !done.load(Ordering::Acquire) {
                        let floor = committed.load(Ordering::Acquire);

                        let latest = querier.get_latest_block_number().unwrap();
                        assert!(latest >= last_seen, "latest height went from {last_seen} to {latest}");
                        assert!(latest >= floor);
                        last_seen = latest;

                        let height = rng.gen_range(1..=floor);
                        let tx = querier
                            .get_transaction_by_hash(&tx_hash(height, 0))
                            .unwrap_or_else(|e| panic!("tx at height {height} missing: {e}"));
                        assert_eq!(tx.block_number, Some(height));
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for height in 2..=BLOCKS {
            execute_block(&mut watcher, height, 1);
            committed.store(height, Ordering::Release);
        }
        watcher.close();
        done.store(true, Ordering::Release);

        for reader in readers {
            let reads = reader.join().expect("reader panicked");
            assert!(reads > 0);
        }
        assert_eq!(querier.get_latest_block_number().unwrap(), BLOCKS);
        assert_eq!(watcher.processor().pending_epochs(), 0);
    }

    #[test]
    fn test_reader_sees_pending_delete_until_drained() {
        let store = Arc::new(InMemoryWatchStore::new());
        let config = FastQueryConfig::enabled().with_async_commit(true);
        let FastQuery {
            mut watcher,
            querier,
        } = FastQuery::build(config, store, None).unwrap();

        execute_block(&mut watcher, 1, 1);
        let sender = [0x5E; 20];
        assert!(querier.get_account(&sender).is_ok());

        watcher.new_height(2, [2u8; 32], Default::default());
        watcher.add_del_acc_msg(sender, true);
        watcher.commit().unwrap();

        let reader = {
            let querier = querier.clone();
            thread::spawn(move || querier.get_account(&sender).unwrap_err().is_not_found())
        };
        assert!(reader.join().expect("reader panicked"));

        watcher.close();
        assert!(querier.get_account(&sender).unwrap_err().is_not_found());
    }

    #[test]
    fn test_state_readers_never_fall_behind_sealed_epoch() {
        let store = Arc::new(InMemoryWatchStore::new());
        let config = FastQueryConfig::enabled()
            .with_async_commit(true)
            .with_commit_gap_height(4);
        let FastQuery {
            mut watcher,
            querier,
        } = FastQuery::build(config, store, None).unwrap();

        let contract = [0xC1; 20];
        let slot = [0x01; 32];
        let seal = |watcher: &mut qc_18_fast_query::WatcherTx, height: u64| {
            watcher.new_height(height, [height as u8; 32], Default::default());
            watcher.save_state(contract, &slot, &height.to_be_bytes());
            watcher.finalize();
            watcher.commit().unwrap();
        };

        seal(&mut watcher, 1);
        let sealed = Arc::new(AtomicU64::new(1));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let querier = querier.clone();
                let sealed = sealed.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut reads = 0u64;
                    while !done.load(Ordering::Acquire) {
                        let floor = sealed.load(Ordering::Acquire);
                        let bytes = querier.must_get_state(&contract, &slot).unwrap();
                        let value = u64::from_be_bytes(bytes.as_slice().try_into().unwrap());
                        assert!(value >= floor, "slot read {value} after epoch {floor} sealed");
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for height in 2..=BLOCKS {
            seal(&mut watcher, height);
            sealed.store(height, Ordering::Release);
        }
        watcher.close();
        done.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.join().expect("reader panicked") > 0);
        }
        let bytes = querier.must_get_state(&contract, &slot).unwrap();
        assert_eq!(bytes, BLOCKS.to_be_bytes().to_vec());
    }
}
