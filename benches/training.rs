use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use datalens::anomaly::{numeric_matrix, AnomalyDetector, IsolationForest};
use datalens::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();

    // Target is the sum of features plus noise
    let target: Vec<Option<f64>> = (0..n_rows)
        .map(|i| Some(features.iter().map(|f| f[i]).sum::<f64>() + rng.gen::<f64>() * 0.1))
        .collect();

    let mut columns: Vec<DataColumn> = features
        .into_iter()
        .enumerate()
        .map(|(i, values)| DataColumn::float(format!("feature_{}", i), values.into_iter().map(Some).collect()))
        .collect();
    columns.push(DataColumn::float("target", target));

    Dataset::new(columns).unwrap()
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [500, 2000].iter() {
        let ds = create_regression_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("predictor", n_rows), &ds, |b, ds| {
            b.iter(|| {
                AutoMLPredictor::new()
                    .with_n_estimators(20)
                    .train(black_box(ds), "target")
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_isolation_forest(c: &mut Criterion) {
    let mut group = c.benchmark_group("isolation_forest");

    for n_rows in [1000, 10000].iter() {
        let ds = create_regression_data(*n_rows, 5);
        let names: Vec<String> = ds.column_names().iter().map(|s| s.to_string()).collect();
        let x = numeric_matrix(&ds, &names).unwrap();

        group.bench_with_input(BenchmarkId::new("fit_predict", n_rows), &x, |b, x| {
            b.iter(|| {
                let mut detector = IsolationForest::new();
                detector.fit(black_box(x)).unwrap();
                detector.predict(x).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_isolation_forest);
criterion_main!(benches);
