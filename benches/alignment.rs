use criterion::{black_box, criterion_group, criterion_main, Criterion};

use slopeladder::{
    align::solve,
    distance::{CostMatrix, Metric},
    generators::{nested_rings, parallel_lines},
    AlignConfig,
};

fn solver(c: &mut Criterion) {
    let stack = parallel_lines(2, 400, 5.0, 2.0);
    let costs = CostMatrix::euclidean(&stack.isolines[0].points, &stack.isolines[1].points);

    c.bench_function("solve 400x400", |b| b.iter(|| black_box(solve(&costs))));
}

fn stacks(c: &mut Criterion) {
    let rings = nested_rings(8, 200, 3.0);
    c.bench_function("align 8 rings", |b| {
        b.iter(|| black_box(slopeladder::align(&rings, &AlignConfig::default())))
    });

    let lines = parallel_lines(4, 200, 5.0, 2.0);
    let config = AlignConfig {
        metric: Metric::Geodesic,
        ..AlignConfig::default()
    };
    c.bench_function("align 4 lines, geodesic", |b| {
        b.iter(|| black_box(slopeladder::align(&lines, &config)))
    });
}

criterion_group!(benches, solver, stacks);
criterion_main!(benches);
