//! Ingest measured end to end.

use std::time::Duration;

use filterbench::{
    BenchmarkRunner, Engine, EngineConfig, LocalEngineFactory, QuiescenceBarrier, measure_ingest,
};
use filterbench_core::{
    DatasetGenerator, DatasetSpec, Layout, SeededRandomProvider, TokioTimeProvider,
};

#[tokio::test]
async fn test_columnar_ingest_produces_one_sample() {
    let dataset = DatasetGenerator::new(SeededRandomProvider::new(42))
        .generate(&DatasetSpec::new(100_000, 10).layout(Layout::Columnar))
        .unwrap();

    let time = TokioTimeProvider::new();
    let barrier = QuiescenceBarrier::new(time.clone(), Duration::from_secs(60));
    let mut runner = BenchmarkRunner::new(time);

    let engine = measure_ingest(
        &mut runner,
        &LocalEngineFactory::new(),
        &barrier,
        dataset,
        EngineConfig::default(),
    )
    .await
    .unwrap()
    .expect("ingest succeeded");

    let samples = runner.samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].name, "Ingest (columnar)");
    assert_eq!(samples[0].dataset_size, 100_000);
    assert!(samples[0].elapsed_ms.unwrap() > 0.0);

    assert_eq!(engine.active_count().await.unwrap(), 100_000);
    engine.dispose().await.unwrap();
}
