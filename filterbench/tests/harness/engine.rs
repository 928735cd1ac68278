//! Quiescence and clear-strategy behaviour of the reference engine.

use filterbench::{DimensionHandle, Engine, EngineConfig, EngineFactory, LocalEngineFactory};
use filterbench_core::{
    ClearStrategy, Dataset, DatasetGenerator, DatasetSpec, Layout,
    SeededRandomProvider,
};

fn dataset(rows: usize, dims: usize, layout: Layout) -> Dataset {
    DatasetGenerator::new(SeededRandomProvider::new(2024))
        .generate(&DatasetSpec::new(rows, dims).layout(layout))
        .unwrap()
}

fn expected_in_range(dataset: &Dataset, dim: &str, lo: f64, hi: f64) -> usize {
    dataset
        .column(dim)
        .unwrap()
        .into_iter()
        .filter(|v| *v >= lo && *v < hi)
        .count()
}

#[tokio::test]
async fn test_filter_fully_applied_after_when_idle() {
    let data = dataset(50_000, 3, Layout::Columnar);
    let expected = expected_in_range(&data, "dim0", 100.0, 200.0);

    let engine = LocalEngineFactory::new()
        .create(data, EngineConfig::default())
        .await
        .unwrap();
    engine.when_idle().await.unwrap();
    assert_eq!(engine.active_count().await.unwrap(), 50_000);

    let dim = engine.dimension("dim0").await.unwrap();
    dim.filter(100.0..200.0).unwrap();
    engine.when_idle().await.unwrap();
    assert_eq!(engine.active_count().await.unwrap(), expected);

    engine.dispose().await.unwrap();
}

#[tokio::test]
async fn test_delta_and_recompute_clear_agree() {
    let mut counts = Vec::new();
    for strategy in [ClearStrategy::Delta, ClearStrategy::Recompute] {
        let engine = LocalEngineFactory::new()
            .create(dataset(20_000, 3, Layout::Rows), EngineConfig::default())
            .await
            .unwrap();
        engine.build_index("dim1").await.unwrap();
        let dim0 = engine.dimension("dim0").await.unwrap();
        let dim1 = engine.dimension("dim1").await.unwrap();
        dim0.filter(0.0..600.0).unwrap();
        dim1.filter(250.0..500.0).unwrap();
        dim1.filter(300.0..450.0).unwrap();
        dim1.clear(strategy).unwrap();
        engine.when_idle().await.unwrap();
        counts.push(engine.active_count().await.unwrap());
        engine.dispose().await.unwrap();
    }
    assert_eq!(counts[0], counts[1]);

    let data = dataset(20_000, 3, Layout::Rows);
    assert_eq!(counts[0], expected_in_range(&data, "dim0", 0.0, 600.0));
}

#[tokio::test]
async fn test_burst_settles_to_last_command() {
    let data = dataset(30_000, 2, Layout::Columnar);
    let expected = expected_in_range(&data, "dim1", 63.0, 67.0);
    let engine = LocalEngineFactory::new()
        .create(data, EngineConfig::default().with_reclaim_every(3))
        .await
        .unwrap();
    engine.build_index("dim1").await.unwrap();

    // issue the whole sweep before waiting once
    let dim = engine.dimension("dim1").await.unwrap();
    for s in 0..64 {
        let lo = f64::from(s);
        dim.filter(lo..lo + 4.0).unwrap();
    }
    engine.when_idle().await.unwrap();
    assert_eq!(engine.active_count().await.unwrap(), expected);

    let summary = engine.shard_summary().await.unwrap();
    assert!(summary.total_flushes > 0);
    engine.dispose().await.unwrap();
}
