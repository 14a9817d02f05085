//! Index benchmarks
//!
//! - Insert: sequential and scattered keys into an in-memory index
//! - Point read: in-memory and through the stream provider's cache
//! - Scan: full ascending iteration

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pagetree::{CountMeasure, Index, IndexBuilder, StreamPageAllocator, SumMeasure};

type Item = (u64, i64);

fn builder() -> IndexBuilder<u64, Item> {
    IndexBuilder::new(|item: &Item| item.0)
        .page_size(64)
        .measure(CountMeasure)
        .measure(SumMeasure::new("sum", |item: &Item| item.1))
}

fn populated(count: u64) -> Index<u64, Item> {
    let mut index = builder().build().unwrap();
    for k in 0..count {
        index.add((k, k as i64)).unwrap();
    }
    index
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_insert");

    for count in [1_000u64, 10_000].iter() {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::new("sequential", count), count, |b, &count| {
            b.iter(|| black_box(populated(count)));
        });

        group.bench_with_input(BenchmarkId::new("scattered", count), count, |b, &count| {
            b.iter(|| {
                let mut index = builder().build().unwrap();
                // 7919 is prime, so this visits every key once
                for i in 0..count {
                    let k = (i * 7919) % count;
                    index.add((k, k as i64)).unwrap();
                }
                black_box(index)
            });
        });
    }

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_get");
    let count = 10_000u64;

    let index = populated(count);
    group.bench_function("memory", |b| {
        let mut k = 0;
        b.iter(|| {
            k = (k + 7919) % count;
            black_box(index.get(&k).unwrap())
        });
    });

    let mut allocator = StreamPageAllocator::new(Cursor::new(Vec::new()));
    index.serialize(&mut allocator).unwrap();
    let bytes = allocator.into_inner().into_inner();
    let reopened = builder().cache_size(64).open_stream(Cursor::new(bytes)).unwrap();
    group.bench_function("stream", |b| {
        let mut k = 0;
        b.iter(|| {
            k = (k + 7919) % count;
            black_box(reopened.get(&k).unwrap())
        });
    });

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_scan");
    let count = 10_000u64;
    let index = populated(count);

    group.throughput(Throughput::Elements(count));
    group.bench_function("ascending", |b| {
        b.iter(|| black_box(index.iter().unwrap().filter_map(|entry| entry.ok()).count()));
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_get, bench_scan);
criterion_main!(benches);
