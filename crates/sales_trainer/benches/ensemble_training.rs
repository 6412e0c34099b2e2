use criterion::{black_box, criterion_group, criterion_main, Criterion};
use salescast_core::model::{ForestParams, GbdtParams};
use salescast_core::Regressor;
use salescast_trainer::{Dataset, ForestTrainer, GbdtTrainer};

fn sample_dataset() -> Dataset {
    // Sixteen columns, the width of the default sales preprocessing output.
    let features: Vec<Vec<f64>> = (0..2_000)
        .map(|i| (0..16).map(|f| ((i * (f + 3)) % 97) as f64 / 97.0).collect())
        .collect();
    let targets = features
        .iter()
        .map(|row| row[0] * 3.0 + row[1] * row[2] + 0.1)
        .collect();
    Dataset::new(features, targets).unwrap()
}

fn bench_gbdt_training(c: &mut Criterion) {
    let data = sample_dataset();
    let params = GbdtParams {
        n_estimators: 50,
        max_depth: 5,
        learning_rate: 0.05,
        subsample: 0.8,
        colsample_bytree: 0.8,
        ..GbdtParams::default()
    };

    c.bench_function("gbdt_train_50_trees", |b| {
        b.iter(|| black_box(GbdtTrainer::new(params, 42).train(black_box(&data)).unwrap()));
    });
}

fn bench_forest_training(c: &mut Criterion) {
    let data = sample_dataset();
    let params = ForestParams {
        n_estimators: 50,
        ..ForestParams::random_forest()
    };

    c.bench_function("random_forest_train_50_trees", |b| {
        b.iter(|| black_box(ForestTrainer::new(params, 42).train(black_box(&data)).unwrap()));
    });
}

fn bench_batch_prediction(c: &mut Criterion) {
    let data = sample_dataset();
    let model = ForestTrainer::new(
        ForestParams {
            n_estimators: 100,
            ..ForestParams::extra_trees()
        },
        7,
    )
    .train(&data)
    .unwrap();

    c.bench_function("extra_trees_predict_2000_rows", |b| {
        b.iter(|| black_box(model.predict_batch(black_box(&data.features)).unwrap()));
    });
}

criterion_group!(
    training_benches,
    bench_gbdt_training,
    bench_forest_training,
    bench_batch_prediction
);
criterion_main!(training_benches);
