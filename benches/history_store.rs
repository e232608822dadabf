//! History Store Benchmarks
//!
//! Measures insert (new and duplicate content), manifest listing and frame
//! encoding at history sizes seen in practice.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lamco_clip_history::history::{ContentType, HistoryLimits, HistoryStore};
use lamco_clip_history::protocol::{Response, ServerCodec};
use tokio_util::codec::Encoder;

/// Text snippet of roughly `len` bytes, unique per `seed`
fn snippet(seed: usize, len: usize) -> Vec<u8> {
    let mut data = format!("snippet {} ", seed).into_bytes();
    data.resize(len.max(data.len()), b'x');
    data
}

fn filled_store(capacity: usize, payload_len: usize) -> HistoryStore {
    let store = HistoryStore::new(HistoryLimits::with_capacity(capacity));
    for i in 0..capacity {
        store.insert(ContentType::Text, snippet(i, payload_len));
    }
    store
}

/// Inserting new content into a full store (insert + evict)
fn bench_insert_new(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_insert_new");

    for payload_len in [64usize, 4 * 1024, 1024 * 1024] {
        group.throughput(Throughput::Bytes(payload_len as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(payload_len),
            &payload_len,
            |b, &payload_len| {
                let store = filled_store(100, payload_len);
                let mut seed = 100;
                b.iter(|| {
                    seed += 1;
                    black_box(store.insert(ContentType::Text, snippet(seed, payload_len)));
                });
            },
        );
    }

    group.finish();
}

/// Re-inserting content already in the history (digest match + promote)
fn bench_insert_duplicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_insert_duplicate");

    for capacity in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let store = filled_store(capacity, 256);
            let oldest = snippet(0, 256);
            b.iter(|| black_box(store.insert(ContentType::Text, oldest.clone())));
        });
    }

    group.finish();
}

/// Manifest snapshot under the store lock
fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_list");

    for capacity in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let store = filled_store(capacity, 512);
            b.iter(|| black_box(store.list()));
        });
    }

    group.finish();
}

/// Encoding a full LIST response
fn bench_encode_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("protocol_encode_list");

    for capacity in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let manifest = filled_store(capacity, 512).list();
            let mut codec = ServerCodec::default();
            b.iter(|| {
                let mut dst = BytesMut::new();
                codec
                    .encode(Response::List(manifest.clone()), &mut dst)
                    .unwrap();
                black_box(dst)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_new,
    bench_insert_duplicate,
    bench_list,
    bench_encode_list
);
criterion_main!(benches);
