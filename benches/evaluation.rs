use criterion::{black_box, criterion_group, criterion_main, Criterion};
use formulix::{Evaluator, ExecutionMode};
use std::collections::HashMap;

const FORMULA: &str = "(var1 + var2 * 3) / (2 + 3) - if(var1 > var2, sin(var2), cos(var1))";

fn variables() -> HashMap<String, f64> {
    HashMap::from([
        ("var1".to_string(), 10.5),
        ("var2".to_string(), 20.25),
    ])
}

fn bench_build(c: &mut Criterion) {
    let evaluator = Evaluator::builder().cache_enabled(false).build().unwrap();
    c.bench_function("build_formula", |b| {
        b.iter(|| evaluator.create_delegate(black_box(FORMULA)).unwrap())
    });
}

fn bench_interpreted(c: &mut Criterion) {
    let evaluator = Evaluator::builder()
        .execution_mode(ExecutionMode::Interpreted)
        .build()
        .unwrap();
    let formula = evaluator.create_delegate(FORMULA).unwrap();
    let vars = variables();
    c.bench_function("evaluate_interpreted", |b| {
        b.iter(|| formula.evaluate(black_box(&vars)).unwrap())
    });
}

fn bench_compiled(c: &mut Criterion) {
    let evaluator = Evaluator::builder()
        .execution_mode(ExecutionMode::Compiled)
        .build()
        .unwrap();
    let formula = evaluator.create_delegate(FORMULA).unwrap();
    let vars = variables();
    c.bench_function("evaluate_compiled", |b| {
        b.iter(|| formula.evaluate(black_box(&vars)).unwrap())
    });
}

fn bench_cached_evaluate(c: &mut Criterion) {
    let evaluator = Evaluator::new();
    let vars = variables();
    c.bench_function("evaluate_through_cache", |b| {
        b.iter(|| evaluator.evaluate(black_box(FORMULA), black_box(&vars)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_interpreted,
    bench_compiled,
    bench_cached_evaluate
);
criterion_main!(benches);
