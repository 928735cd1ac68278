//! Scenario scripting and replay.

use std::time::Duration;

use filterbench::scenario::{BrushSweep, JsonScenario, RandomBrush, StopReason};
use filterbench::{Engine, EngineConfig, EngineFactory, LocalEngineFactory, Scenario, ScenarioDriver, ScenarioRegistry};
use filterbench_core::{
    BenchError, BenchResult, Command, DatasetGenerator, DatasetSpec, SeededRandomProvider,
    TokioTimeProvider,
};

#[test]
fn test_brush_sweep_properties() {
    let commands: Vec<Command> = BrushSweep::default()
        .script()
        .collect::<BenchResult<_>>()
        .unwrap();
    assert_eq!(commands.len(), 64);

    let seqs: Vec<u64> = commands.iter().map(Command::seq).collect();
    assert_eq!(seqs, (0..64).collect::<Vec<u64>>());
    assert!(commands.iter().all(|c| c.dim_id() == "dim0"));
    for command in &commands {
        let Command::FilterSet { lo, hi, .. } = command else {
            panic!("brush sweep emitted {command:?}");
        };
        assert_eq!(hi - lo, 4.0);
    }
}

#[test]
fn test_registry_composition_keeps_seq_increasing() {
    let mut registry = ScenarioRegistry::new();
    registry
        .register(BrushSweep::new("dim0").steps(10))
        .register(RandomBrush::new(1, vec!["dim1".into(), "dim2".into()], 0.0, 1000.0).unwrap());

    let composed = registry
        .round_robin("sweep+random", &["brush-sweep", "random-brush"])
        .unwrap();
    let seqs: Vec<u64> = composed
        .script()
        .take(30)
        .map(|c| c.unwrap().seq())
        .collect();
    assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
    assert_eq!(seqs[0], 0);
}

#[tokio::test]
async fn test_unknown_command_aborts_replay() {
    let dataset = DatasetGenerator::new(SeededRandomProvider::new(8))
        .generate(&DatasetSpec::new(1_000, 1))
        .unwrap();
    let engine = LocalEngineFactory::new()
        .create(dataset, EngineConfig::default())
        .await
        .unwrap();

    let scenario = JsonScenario::from_json(
        "recorded",
        r#"[
            {"t":"FILTER_SET","dimId":"dim0","lo":0,"hi":500,"seq":0},
            {"t":"ROW_DELETE","row":3},
            {"t":"FILTER_SET","dimId":"dim0","lo":0,"hi":100,"seq":2}
        ]"#,
    )
    .unwrap();
    let driver = ScenarioDriver::new(&engine, TokioTimeProvider::new(), Duration::from_secs(5));
    let result = driver.replay(&scenario).await;
    assert!(matches!(result, Err(BenchError::UnknownCommand(tag)) if tag == "ROW_DELETE"));

    // the first command was applied, the third never was
    let dataset = DatasetGenerator::new(SeededRandomProvider::new(8))
        .generate(&DatasetSpec::new(1_000, 1))
        .unwrap();
    let expected = dataset
        .column("dim0")
        .unwrap()
        .into_iter()
        .filter(|v| *v < 500.0)
        .count();
    assert_eq!(engine.active_count().await.unwrap(), expected);
    engine.dispose().await.unwrap();
}

#[tokio::test]
async fn test_time_budget_stops_unbounded_script() {
    let dataset = DatasetGenerator::new(SeededRandomProvider::new(8))
        .generate(&DatasetSpec::new(500, 2))
        .unwrap();
    let engine = LocalEngineFactory::new()
        .create(dataset, EngineConfig::default())
        .await
        .unwrap();
    let brush = RandomBrush::new(4, vec!["dim0".into(), "dim1".into()], 0.0, 1000.0).unwrap();

    let stats = ScenarioDriver::new(&engine, TokioTimeProvider::new(), Duration::from_secs(5))
        .budget(filterbench::scenario::Budget::duration(Duration::from_millis(50)))
        .replay(&brush)
        .await
        .unwrap();
    assert_eq!(stats.stop, StopReason::TimeBudget);
    assert!(stats.commands > 0);
    engine.dispose().await.unwrap();
}
