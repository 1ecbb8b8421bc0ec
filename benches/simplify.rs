use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use slopeladder::{
    generators::{nested_rings, parallel_lines},
    AlignConfig, IsolineStack, Simplifier, SimplifyConfig,
};

fn halve(c: &mut Criterion, name: &str, stack: &IsolineStack, config: SimplifyConfig) {
    let alignment = slopeladder::align(stack, &AlignConfig::default()).unwrap();
    let target = stack.vertex_count() / 2;
    c.bench_function(name, |b| {
        b.iter_batched(
            || Simplifier::new(stack, &alignment, config).unwrap(),
            |mut s| black_box(s.run_until(target)),
            BatchSize::SmallInput,
        )
    });
}

fn ladders(c: &mut Criterion) {
    let rings = nested_rings(6, 100, 3.0);
    halve(c, "halve 6 rings", &rings, SimplifyConfig::default());

    let lines = parallel_lines(6, 100, 5.0, 2.0);
    halve(c, "halve 6 lines", &lines, SimplifyConfig::default());
}

fn singletons(c: &mut Criterion) {
    let rings = nested_rings(6, 100, 3.0);
    let config = SimplifyConfig {
        singleton_ladders: true,
        ..SimplifyConfig::default()
    };
    halve(c, "halve 6 rings, singleton ladders", &rings, config);
}

criterion_group!(benches, ladders, singletons);
criterion_main!(benches);
