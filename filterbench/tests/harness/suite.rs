//! Suite orchestration and per-sample failure recovery.

use std::time::Duration;

use filterbench::report::{DirectorySink, MemorySink};
use filterbench::runner::{BaselinePlan, MultiFilterPlan};
use filterbench::{
    BenchmarkPlan, HarnessConfig, InProcessExecutor, LocalEngineFactory, PlanContext, Report,
    ReportAggregator, SuiteOrchestrator, default_suite,
};
use filterbench_core::{BenchError, TokioTimeProvider};
use tempfile::TempDir;

use crate::fake::{ScriptedExecutor, SlowFactory, StuckFactory};

#[tokio::test]
async fn test_failing_step_aborts_suite() {
    let mut executor = ScriptedExecutor {
        fail_on: Some("multi-rows".to_string()),
        ..ScriptedExecutor::default()
    };
    let result = SuiteOrchestrator::new(TokioTimeProvider::new())
        .steps(["baseline-rows", "multi-rows", "micro-histogram"])
        .run(&mut executor)
        .await;

    match result {
        Err(BenchError::StepFailed { step, reason }) => {
            assert_eq!(step, "multi-rows");
            assert!(reason.contains("exit status 1"));
        }
        other => panic!("expected StepFailed, got {other:?}"),
    }
    assert_eq!(executor.executed, vec!["baseline-rows", "multi-rows"]);
}

#[tokio::test]
async fn test_step_timeout() {
    let mut executor = ScriptedExecutor {
        hang_on: Some("stuck".to_string()),
        ..ScriptedExecutor::default()
    };
    let result = SuiteOrchestrator::new(TokioTimeProvider::new())
        .steps(["ok", "stuck", "never"])
        .step_timeout(Duration::from_millis(50))
        .cleanup_grace(Duration::from_millis(20))
        .run(&mut executor)
        .await;
    assert!(matches!(result, Err(BenchError::StepTimeout { step, .. }) if step == "stuck"));
    assert_eq!(executor.executed, vec!["ok", "stuck"]);
}

#[tokio::test]
async fn test_idle_timeout_recorded_as_failed_sample() {
    let factory = StuckFactory::default();
    let ctx = PlanContext::new(&factory, TokioTimeProvider::new(), 1)
        .idle_timeout(Duration::from_millis(20));
    let mut plan = BaselinePlan::new("baseline-stuck", 100, 2);

    let Report::Baseline(report) = BenchmarkPlan::run(&mut plan, &ctx).await.unwrap() else {
        panic!("expected baseline report");
    };
    assert_eq!(report.ingest_ms, None);
    assert_eq!(report.samples.len(), 1);
    let sample = &report.samples[0];
    assert_eq!(sample.name, "Ingest (rows)");
    assert!(sample.error.as_deref().unwrap().contains("did not settle"));
    assert!(factory.disposed.get(), "engine must be disposed after a failed settle");
}

#[tokio::test]
async fn test_timed_out_step_still_disposes_engine() {
    let factory = StuckFactory::default();
    let ctx = PlanContext::new(&factory, TokioTimeProvider::new(), 1)
        .idle_timeout(Duration::from_secs(10));
    let mut executor = InProcessExecutor::new(ctx, MemorySink::new())
        .plan(Box::new(BaselinePlan::new("baseline-stuck", 100, 2)));

    let result = SuiteOrchestrator::new(TokioTimeProvider::new())
        .step("baseline-stuck")
        .step_timeout(Duration::from_millis(50))
        .run(&mut executor)
        .await;
    assert!(matches!(result, Err(BenchError::StepTimeout { step, .. }) if step == "baseline-stuck"));
    assert!(factory.disposed.get(), "engine must be disposed after a step timeout");
    assert!(executor.sink().entries().is_empty());
}

#[tokio::test]
async fn test_busy_engine_receives_nothing_after_idle_timeout() {
    let factory = SlowFactory::new(Duration::from_millis(200));
    let ctx = PlanContext::new(&factory, TokioTimeProvider::new(), 1)
        .idle_timeout(Duration::from_millis(20));
    let mut plan = BaselinePlan::new("baseline-slow", 100, 2);

    let Report::Baseline(report) = BenchmarkPlan::run(&mut plan, &ctx).await.unwrap() else {
        panic!("expected baseline report");
    };
    assert_eq!(factory.log.issued_while_busy.get(), 0);
    assert_eq!(
        *factory.log.calls.borrow(),
        vec!["dimension dim0", "build_index dim0", "filter dim0"]
    );
    assert!(report.ingest_ms.is_some());
    assert!(report.index.ms.is_some());
    assert_eq!(report.filter.ms, None);
    assert_eq!(report.clear_ms, None);

    let clear = report.samples.last().unwrap();
    assert_eq!(clear.name, "Clear (delta)");
    assert!(clear.error.as_deref().unwrap().contains("skipped"));
    assert!(factory.log.disposed.get());
}

#[tokio::test]
async fn test_multi_filter_chain_stops_at_unsettled_link() {
    let factory = SlowFactory::new(Duration::from_millis(200));
    let ctx = PlanContext::new(&factory, TokioTimeProvider::new(), 1)
        .idle_timeout(Duration::from_millis(20));
    let mut plan = MultiFilterPlan::rows(100, 2, 2).unwrap();

    let Report::MultiFilter(report) = BenchmarkPlan::run(&mut plan, &ctx).await.unwrap() else {
        panic!("expected multi-filter report");
    };
    assert_eq!(factory.log.issued_while_busy.get(), 0);
    assert_eq!(
        *factory.log.calls.borrow(),
        vec!["dimension dim0", "dimension dim1", "build_index dim0", "filter dim0"]
    );
    assert!(report.filters.iter().all(|e| e.ms.is_none()));
    assert!(report.clears.iter().all(|e| e.ms.is_none()));
    assert_eq!(report.shard_summary, None);

    let after_timeout: Vec<&str> = report
        .samples
        .iter()
        .skip_while(|s| s.name != "Filter (dim0)")
        .skip(1)
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(
        after_timeout,
        vec!["Build index (dim1)", "Filter (dim1)", "Clear (dim1)", "Clear (dim0)", "Brush sweep (dim0)"]
    );
    assert!(report.samples.iter().skip(2).all(|s| s.error.is_some()));
    assert!(factory.log.disposed.get());
}

#[tokio::test]
async fn test_abort_on_first_failure_fails_plan() {
    let factory = StuckFactory::default();
    let ctx = PlanContext::new(&factory, TokioTimeProvider::new(), 1)
        .idle_timeout(Duration::from_millis(20))
        .abort_on_first_failure(true);
    let mut plan = MultiFilterPlan::rows(100, 2, 2).unwrap();
    let result = BenchmarkPlan::run(&mut plan, &ctx).await;
    assert!(matches!(result, Err(BenchError::IdleTimeout(_))));
    assert!(factory.disposed.get());
}

#[tokio::test]
async fn test_in_process_suite_writes_reports() {
    let dir = TempDir::new().unwrap();
    let config = HarnessConfig {
        rows: 2_000,
        large_rows: 4_000,
        dimensions: 4,
        chain_length: 3,
        report_dir: dir.path().to_path_buf(),
        ..HarnessConfig::default()
    };
    let factory = LocalEngineFactory::new();
    let time = TokioTimeProvider::new();
    let ctx = PlanContext::new(&factory, time.clone(), config.seed)
        .idle_timeout(config.idle_timeout())
        .engine_config(config.engine_config());
    let sink = DirectorySink::new(&config.report_dir).unwrap();
    let mut executor = InProcessExecutor::new(ctx, sink).plans(default_suite(&config).unwrap());

    let report = SuiteOrchestrator::new(time)
        .steps(executor.step_names())
        .step_timeout(config.step_timeout())
        .run(&mut executor)
        .await
        .unwrap();
    assert_eq!(report.steps.len(), 10);

    let rows = ReportAggregator::new(config.keep_baselines)
        .aggregate_dir(dir.path())
        .unwrap();
    assert_eq!(rows.len(), 7);
    let last = rows.last().unwrap();
    assert!(last.filter_chain.as_deref().unwrap().starts_with("dim0:"));
    assert!(last.shard_flushes.unwrap() > 0);
}

#[tokio::test]
async fn test_memory_sink_collects_artifacts() {
    let factory = LocalEngineFactory::new();
    let ctx = PlanContext::new(&factory, TokioTimeProvider::new(), 3);
    let mut executor = InProcessExecutor::new(ctx, MemorySink::new())
        .plan(Box::new(BaselinePlan::new("baseline-rows", 500, 2)));

    let report = SuiteOrchestrator::new(TokioTimeProvider::new())
        .step("baseline-rows")
        .run(&mut executor)
        .await
        .unwrap();
    assert_eq!(report.steps.len(), 1);
    assert_eq!(executor.sink().entries().len(), 1);
    assert!(report.steps[0].artifact.starts_with("baseline-"));

    let missing = SuiteOrchestrator::new(TokioTimeProvider::new())
        .step("not-registered")
        .run(&mut executor)
        .await;
    assert!(matches!(missing, Err(BenchError::StepFailed { .. })));
}
