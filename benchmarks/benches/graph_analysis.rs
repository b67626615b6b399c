//! Graph construction and structural analysis benchmarks
//!
//! Run with: cargo bench --bench graph_analysis

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tradf_benchmarks::{chain, ladder, network};
use tradf_core::scheduling::reference_constraints;
use tradf_core::TradfGraph;

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    let net = network();

    for &len in &[4usize, 8, 12] {
        let desc = ladder(len);
        group.bench_with_input(BenchmarkId::new("ladder", len), &desc, |b, desc| {
            b.iter(|| black_box(TradfGraph::new(black_box(desc), &net).unwrap()));
        });
    }
    let desc = chain(64);
    group.bench_function("chain_64", |b| {
        b.iter(|| black_box(TradfGraph::new(black_box(&desc), &net).unwrap()));
    });

    group.finish();
}

fn bench_reference_constraints(c: &mut Criterion) {
    let graph = TradfGraph::new(&ladder(8), &network()).unwrap();
    c.bench_function("reference_constraints_ladder_8", |b| {
        b.iter(|| black_box(reference_constraints(&graph, black_box(0.999)).unwrap()));
    });
}

criterion_group!(benches, bench_build, bench_reference_constraints);
criterion_main!(benches);
