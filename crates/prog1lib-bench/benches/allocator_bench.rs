//! Tracked allocator benchmarks against the bare C heap.

#![allow(unsafe_code)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use prog1lib_runtime::{Config, Runtime, Site};

const SITE: Site = Site::new("bench.c", "bench", 1);

fn quiet_runtime() -> Runtime {
    Runtime::new(Config {
        leak_check: false,
        ..Config::default()
    })
}

fn bench_alloc_release_cycle(c: &mut Criterion) {
    let sizes: &[usize] = &[16, 64, 256, 1024, 4096, 32768];
    let runtime = quiet_runtime();
    let mut group = c.benchmark_group("alloc_release_cycle");

    for &size in sizes {
        group.bench_with_input(BenchmarkId::new("tracked", size), &size, |b, &sz| {
            b.iter(|| {
                let block = runtime.allocate(criterion::black_box(sz), SITE);
                runtime.release(block);
            });
        });
        group.bench_with_input(BenchmarkId::new("libc", size), &size, |b, &sz| {
            b.iter(|| {
                // SAFETY: the block is freed right after allocation.
                unsafe {
                    let block = libc::malloc(criterion::black_box(sz));
                    libc::free(block);
                }
            });
        });
    }
    group.finish();
}

fn bench_live_set(c: &mut Criterion) {
    let runtime = quiet_runtime();
    let mut group = c.benchmark_group("live_set");

    for &live in &[0_usize, 1_000, 100_000] {
        let resident: Vec<_> = (0..live).map(|_| runtime.allocate(32, SITE)).collect();
        group.bench_with_input(BenchmarkId::new("alloc_release", live), &live, |b, _| {
            b.iter(|| {
                let block = runtime.allocate(64, SITE);
                runtime.release(block);
            });
        });
        for block in resident {
            runtime.release(block);
        }
    }
    group.finish();
}

fn bench_realloc_growth(c: &mut Criterion) {
    let runtime = quiet_runtime();
    let mut group = c.benchmark_group("realloc_growth");

    group.bench_function("double_to_64KiB", |b| {
        b.iter(|| {
            let mut size = 16;
            let mut block = runtime.allocate(size, SITE).as_ptr();
            while size < 65536 {
                size *= 2;
                block = runtime.reallocate(block, size, SITE);
            }
            runtime.release(block);
        });
    });
    group.finish();
}

fn bench_leak_report(c: &mut Criterion) {
    let runtime = quiet_runtime();
    let resident: Vec<_> = (0..10_000).map(|i| runtime.allocate(i % 256, SITE)).collect();

    c.bench_function("leak_report_10k", |b| {
        b.iter(|| criterion::black_box(runtime.leak_report().total_bytes()));
    });

    for block in resident {
        runtime.release(block);
    }
}

criterion_group!(
    benches,
    bench_alloc_release_cycle,
    bench_live_set,
    bench_realloc_growth,
    bench_leak_report
);
criterion_main!(benches);
