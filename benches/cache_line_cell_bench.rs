use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use memlat::cell::CacheLineCell;
use std::hint;

fn bench_cache_line_cell(c: &mut Criterion) {
    let cell = CacheLineCell::new(0);

    let mut group = c.benchmark_group("cache line cell");
    group.throughput(Throughput::Elements(1));
    group.bench_function("load", |b| {
        b.iter(|| hint::black_box(cell.load()));
    });
    group.bench_function("store", |b| {
        b.iter(|| cell.store(hint::black_box(1)));
    });
    group.bench_function("atomic_inc", |b| {
        b.iter(|| cell.atomic_inc());
    });
    group.finish();
}

criterion_group!(benches, bench_cache_line_cell);
criterion_main!(benches);
