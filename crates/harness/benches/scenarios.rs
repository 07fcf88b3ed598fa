//! Benchmarks for the scenario runners
//!
//! Operations complete immediately and injected latency is off, so these
//! measure the bookkeeping overhead of the primitives themselves.

#![allow(clippy::expect_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use harness::{
    ChaosScenarioConfig, RecoveryScenarioConfig, ResilienceScenarioConfig, run_chaos_scenario,
    run_recovery_scenario, run_resilience_scenario,
};
use tokio::runtime::Runtime;

fn bench_resilience(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create runtime");
    let mut group = c.benchmark_group("resilience_scenario");

    for op_count in [10u32, 100, 1_000] {
        let config = ResilienceScenarioConfig {
            op_count,
            ..Default::default()
        };
        group.throughput(Throughput::Elements(u64::from(op_count)));
        group.bench_with_input(BenchmarkId::from_parameter(op_count), &config, |b, cfg| {
            b.to_async(&rt)
                .iter(|| run_resilience_scenario(cfg, || async { Ok::<(), String>(()) }));
        });
    }

    group.finish();
}

fn bench_chaos(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create runtime");
    let mut group = c.benchmark_group("chaos_scenario");

    let mut config = ChaosScenarioConfig {
        iterations: 1_000,
        ..Default::default()
    }
    .with_seed(42);
    config.latency_injector.enabled = false;

    group.throughput(Throughput::Elements(1_000));
    group.bench_function("seeded_1000", |b| {
        b.to_async(&rt)
            .iter(|| run_chaos_scenario(&config, || async { Ok::<(), String>(()) }));
    });

    group.finish();
}

fn bench_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("recovery_scenario");
    let config = RecoveryScenarioConfig {
        checkpoints: 32,
        replay_events: 1_000,
        ..Default::default()
    };

    group.bench_function("checkpoint_and_replay", |b| {
        b.iter(|| run_recovery_scenario(&config));
    });

    group.finish();
}

criterion_group!(benches, bench_resilience, bench_chaos, bench_recovery);
criterion_main!(benches);
