//! Prometheus export benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shim_metrics_bench::BenchContext;

fn bench_to_prometheus(c: &mut Criterion) {
    let mut group = c.benchmark_group("export/to_prometheus");

    for labels in [8usize, 64, 512] {
        let ctx = BenchContext::new();
        ctx.populate(labels, 20);

        group.bench_with_input(BenchmarkId::from_parameter(labels), &labels, |b, _| {
            b.iter(|| black_box(ctx.registry.to_prometheus()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_to_prometheus);

criterion_main!(benches);
