//! Generation throughput benchmarks: single-schema, nested `perParent`, and
//! an unconstrained-vs-constrained comparison for the retry loop.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use vague::{compile, Config, Seed};

fn flat_source(count: u32) -> String {
    format!(
        "schema User {{\n    id: unique int\n    name: faker.name()\n    age: 18..65\n}}\n\ndataset Sample {{\n    users: {count} of User\n}}\n"
    )
}

fn nested_source(users: u32, orders_per_user: u32) -> String {
    format!(
        "schema User {{\n    id: unique int\n}}\n\nschema Order {{\n    id: unique int\n    total: 10..500\n}}\n\ndataset Sample {{\n    users: {users} of User\n    orders: {orders_per_user} per user of Order\n}}\n"
    )
}

fn constrained_source(count: u32) -> String {
    format!(
        "schema Account {{\n    balance: 0..1000\n    assume balance > 900\n}}\n\ndataset Sample {{\n    accounts: {count} of Account\n}}\n"
    )
}

fn bench_flat_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_generation");
    for &size in &[100u32, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let source = flat_source(size);
            b.iter(|| compile(&source, Seed::Value(1), Config::default(), &Default::default()).expect("compile"));
        });
    }
    group.finish();
}

fn bench_nested_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_generation");
    for &size in &[100u32, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let source = nested_source(size, 3);
            b.iter(|| compile(&source, Seed::Value(1), Config::default(), &Default::default()).expect("compile"));
        });
    }
    group.finish();
}

fn bench_constraint_retry(c: &mut Criterion) {
    let source = constrained_source(500);
    c.bench_function("constraint_retry_loop", |b| {
        b.iter(|| compile(&source, Seed::Value(1), Config::default(), &Default::default()).expect("compile"));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3));
    targets = bench_flat_generation, bench_nested_generation, bench_constraint_retry
}
criterion_main!(benches);
