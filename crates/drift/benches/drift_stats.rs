use criterion::{Criterion, black_box, criterion_group, criterion_main};
use drift::stats::{ks_statistic, population_stability_index};
use std::collections::BTreeMap;

fn class_counts(classes: &[(&str, usize)]) -> BTreeMap<String, usize> {
    classes
        .iter()
        .map(|(name, count)| (name.to_string(), *count))
        .collect()
}

fn synthetic_sample(len: usize, offset: f64) -> Vec<f64> {
    (0..len)
        .map(|i| offset + (i as f64 * 0.618_033_9).fract())
        .collect()
}

fn bench_psi(c: &mut Criterion) {
    let reference = class_counts(&[("car", 620), ("truck", 210), ("person", 170)]);
    let current = class_counts(&[("car", 480), ("truck", 260), ("person", 200), ("bus", 60)]);

    c.bench_function("psi_four_classes", |b| {
        b.iter(|| population_stability_index(black_box(&reference), black_box(&current)))
    });
}

fn bench_ks(c: &mut Criterion) {
    let mut group = c.benchmark_group("ks_statistic");
    for size in [100usize, 1_000, 10_000] {
        let reference = synthetic_sample(size, 0.0);
        let current = synthetic_sample(size, 0.1);
        group.bench_function(format!("{size}_samples"), |b| {
            b.iter(|| ks_statistic(black_box(&reference), black_box(&current)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_psi, bench_ks);
criterion_main!(benches);
