//! # Fast-Query Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Read hit in the current epoch | < 1µs |
//! | Read falling through 64 sealed epochs | < 10µs |
//! | Seal + drain of a 1000-message epoch | < 5ms |
//! | WatchData encode/decode (1000 batches) | < 5ms |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qc_18_fast_query::{
    AcQuerier, AsyncCommitProcessor, Batch, OperationKind, WatchData, WatchMessage, WireCodec,
};
use rand::Rng;

fn state_message(i: u64, value: &[u8]) -> WatchMessage {
    let mut slot = [0u8; 32];
    slot[24..].copy_from_slice(&i.to_be_bytes());
    WatchMessage::state(&[0xAB; 20], &slot, value.to_vec())
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-reads");
    group.measurement_time(Duration::from_secs(5));

    let processor = Arc::new(AsyncCommitProcessor::new());
    processor.batch_set((0..1000).map(|i| state_message(i, b"current")));
    let hot_key = state_message(500, b"").key();
    group.bench_function("current_epoch_hit", |b| {
        b.iter(|| black_box(processor.get(black_box(&hot_key))))
    });

    for depth in [8u64, 64] {
        let processor = Arc::new(AsyncCommitProcessor::new());
        processor.batch_set([state_message(0, b"oldest")]);
        processor.move_to_commit_list(1);
        for version in 2..=depth {
            processor.batch_set([state_message(version, b"filler")]);
            processor.move_to_commit_list(version);
        }
        let querier = AcQuerier::new(processor);
        let deep_key = state_message(0, b"").key();

        group.bench_with_input(BenchmarkId::new("sealed_epoch_scan", depth), &depth, |b, _| {
            b.iter(|| black_box(querier.get_state(black_box(&deep_key))))
        });
    }

    group.finish();
}

fn bench_seal_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-seal-drain");
    group.measurement_time(Duration::from_secs(5));

    for size in [100u64, 1000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("epoch", size), &size, |b, &size| {
            let processor = AsyncCommitProcessor::new();
            let mut version = 0;
            b.iter(|| {
                version += 1;
                processor.batch_set((0..size).map(|i| state_message(i, b"v")));
                processor.move_to_commit_list(version);
                let mut written = 0usize;
                processor.persist_handler(|_, value, _| written += value.len());
                black_box(written)
            })
        });
    }

    group.finish();
}

fn bench_watch_data_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-watch-data");
    let mut rng = rand::thread_rng();

    let data = WatchData {
        batches: (0..1000)
            .map(|i: u32| {
                let value: Vec<u8> = (0..64).map(|_| rng.gen()).collect();
                Batch::new(i.to_be_bytes().to_vec(), value, OperationKind::Set)
            })
            .collect(),
        ..Default::default()
    };

    for codec in [WireCodec::Binary, WireCodec::Json] {
        let encoded = data.encode(codec).unwrap();
        group.bench_function(format!("encode_{:?}", codec), |b| {
            b.iter(|| black_box(data.encode(codec).unwrap()))
        });
        group.bench_function(format!("decode_{:?}", codec), |b| {
            b.iter(|| black_box(WatchData::decode(black_box(&encoded)).unwrap()))
        });
    }

    group.bench_function("filter_copy", |b| b.iter(|| black_box(data.filter_copy())));
    group.finish();
}

criterion_group!(
    benches,
    bench_reads,
    bench_seal_and_drain,
    bench_watch_data_codec
);
criterion_main!(benches);
