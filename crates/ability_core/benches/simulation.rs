//! Simulation benchmarks for ability_core.
//!
//! Run with: `cargo bench -p ability_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use ability_core::simulation::Simulation;
use ability_test_utils::fixtures::{fixed_f, run_for, skirmish};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

/// Tick cost of crowded skirmishes and the cost of a save/load cycle.
pub fn simulation_benchmark(c: &mut Criterion) {
    let dt = fixed_f(0.25);

    for copies in [1, 4] {
        c.bench_function(&format!("tick_skirmish_x{copies}"), |b| {
            b.iter_batched(
                || skirmish(copies),
                |mut sim| black_box(sim.tick(dt)),
                BatchSize::SmallInput,
            )
        });
    }

    c.bench_function("tick_skirmish_x4_warm", |b| {
        let mut sim = skirmish(4);
        run_for(&mut sim, 20, dt);
        b.iter_batched(
            || sim.clone(),
            |mut sim| black_box(sim.tick(dt)),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("serialize_roundtrip_x4", |b| {
        let mut sim = skirmish(4);
        run_for(&mut sim, 20, dt);
        b.iter(|| {
            let bytes = sim.serialize().unwrap_or_default();
            black_box(Simulation::deserialize(&bytes).ok())
        });
    });

    c.bench_function("state_hash_x4", |b| {
        let sim = skirmish(4);
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
