use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use sim_core::{build_headless_app, run_turn, SimulationConfig, WorldRng};

fn bench_turn(c: &mut Criterion) {
    let mut group = c.benchmark_group("turn");

    for population in [8usize, 32, 64, 128] {
        group.bench_with_input(
            BenchmarkId::new("population", population),
            &population,
            |b, &population| {
                b.iter_batched(
                    || {
                        let mut app = build_headless_app();
                        {
                            let mut config = app.world.resource_mut::<SimulationConfig>();
                            config.grid_width = 40;
                            config.grid_height = 40;
                            config.initial_population = population;
                        }
                        app.insert_resource(WorldRng::from_seed(42));
                        // First update pays the startup cost outside the
                        // measured region.
                        run_turn(&mut app);
                        app
                    },
                    |mut app| {
                        run_turn(&mut app);
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(turn_benches, bench_turn);
criterion_main!(turn_benches);
