use paddock_core::{GridContext, SimConfig};
use paddock_planner::plan_targets;
use paddock_sim::{simulate, Simulation};
use paddock_test_utils::fixtures::checkerboard;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn bench_grid() -> GridContext {
    checkerboard(24, 16, 4).expect("build grid")
}

fn bench_config(funnel: bool) -> SimConfig {
    let mut config = if funnel {
        SimConfig::funnel()
    } else {
        SimConfig::standard()
    };
    config.budget.max_ticks = 400;
    config
}

fn bench_full_run(c: &mut Criterion) {
    let ctx = bench_grid();

    c.bench_function("sim/run_drop", |b| {
        b.iter(|| {
            let result = simulate(black_box(ctx.clone()), bench_config(false)).expect("run");
            black_box(result.final_tick);
        });
    });

    c.bench_function("sim/run_funnel", |b| {
        b.iter(|| {
            let result = simulate(black_box(ctx.clone()), bench_config(true)).expect("run");
            black_box(result.final_tick);
        });
    });
}

fn bench_first_ticks(c: &mut Criterion) {
    let ctx = bench_grid();
    let config = bench_config(false);
    let plan = plan_targets(&ctx, &config);

    c.bench_function("sim/first_50_ticks", |b| {
        b.iter(|| {
            let mut sim = Simulation::new(ctx.clone(), plan.clone(), config.clone()).expect("build sim");
            for _ in 0..50 {
                if sim.step().is_some() {
                    break;
                }
            }
            black_box(sim.tick());
        });
    });
}

criterion_group!(benches, bench_full_run, bench_first_ticks);
criterion_main!(benches);
