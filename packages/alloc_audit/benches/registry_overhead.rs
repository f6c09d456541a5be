//! Benchmarks to measure the compute overhead of `alloc_audit` bookkeeping.
//!
//! Each instrumented allocate/release pair is compared against the same pair made directly
//! through the raw allocator.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;

use alloc_audit::{RawAllocator, Registry, SystemAllocator};
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_audit_overhead");

    // Baseline measurement - no bookkeeping at all
    group.bench_function("raw_allocate_release", |b| {
        b.iter(|| {
            let allocator = SystemAllocator;
            let identity = allocator.allocate(black_box(64)).unwrap();

            // SAFETY: Released once, right after being allocated by the same allocator.
            unsafe {
                allocator.release(identity);
            }
        });
    });

    {
        let registry = Registry::system();

        group.bench_function("registry_allocate_release", |b| {
            b.iter(|| {
                let data = registry.allocate::<u8>(black_box(64));
                registry.release(data).unwrap();
            });
        });

        // Release matching cost with many unrelated live allocations around.
        let _background: Vec<_> = (0..1000).map(|_| registry.allocate::<u64>(1)).collect();

        group.bench_function("registry_allocate_release_with_1000_live", |b| {
            b.iter(|| {
                let data = registry.allocate::<u8>(black_box(64));
                registry.release(data).unwrap();
            });
        });

        group.bench_function("registry_report_text_cached", |b| {
            b.iter(|| black_box(registry.report_text()));
        });

        // The background allocations are released when the registry is dropped.
    }

    group.finish();
}
