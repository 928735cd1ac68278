//! Single-filter baseline plan.

use async_trait::async_trait;
use filterbench_core::{
    BenchResult, ClearStrategy, DatasetSpec, Layout, TimeProvider, dimension_name,
};

use super::{BenchmarkPlan, BenchmarkRunner, PlanContext, measure_ingest, window};
use crate::barrier::QuiescenceBarrier;
use crate::engine::{DimensionHandle, Engine, EngineFactory};
use crate::report::{BaselineReport, Latency, Report, ReportCategory, epoch_millis};

/// Ingest, index one dimension, filter it, then clear it.
///
/// Samples: `Ingest (<layout>)`, `Build index (dim0)`, `Filter (dim0)` and
/// `Clear (<strategy>)`. The filter keeps the second tenth of the value
/// range, i.e. `[100, 200)` for the default `[0, 1000)`. If a step leaves
/// the engine busy, the steps after it are reported as failed and never
/// issued.
#[derive(Debug, Clone)]
pub struct BaselinePlan {
    name: String,
    spec: DatasetSpec,
    clear: ClearStrategy,
}

#[derive(Debug, Default)]
struct Timings {
    index: Option<f64>,
    filter: Option<f64>,
    clear: Option<f64>,
}

impl BaselinePlan {
    /// Row-layout baseline with a delta clear.
    pub fn new(name: impl Into<String>, rows: usize, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            spec: DatasetSpec::new(rows, dimensions),
            clear: ClearStrategy::Delta,
        }
    }

    /// Ingest in `layout`.
    pub fn layout(mut self, layout: Layout) -> Self {
        self.spec = self.spec.layout(layout);
        self
    }

    /// Clear with `strategy`.
    pub fn clear(mut self, strategy: ClearStrategy) -> Self {
        self.clear = strategy;
        self
    }

    async fn exercise<E: Engine, T: TimeProvider>(
        &self,
        runner: &mut BenchmarkRunner<T>,
        barrier: &QuiescenceBarrier<T>,
        engine: &E,
    ) -> BenchResult<Timings> {
        let rows = self.spec.rows;
        let name = dimension_name(0);
        let dim = engine.dimension(&name).await?;

        let index = runner
            .measure(format!("Build index ({name})"), rows, async {
                engine.build_index(&name).await?;
                barrier.settle(engine).await
            })
            .await?;

        let range = window(&self.spec, 0.1, 0.2);
        let filter = runner
            .measure(format!("Filter ({name})"), rows, async {
                dim.filter(range)?;
                barrier.settle(engine).await
            })
            .await?;

        let clear = runner
            .measure(format!("Clear ({})", self.clear.label()), rows, async {
                dim.clear(self.clear)?;
                barrier.settle(engine).await
            })
            .await?;

        Ok(Timings {
            index: index.elapsed_ms(),
            filter: filter.elapsed_ms(),
            clear: clear.elapsed_ms(),
        })
    }
}

#[async_trait(?Send)]
impl<F: EngineFactory, T: TimeProvider> BenchmarkPlan<F, T> for BaselinePlan {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ReportCategory {
        ReportCategory::Baseline
    }

    async fn run(&mut self, ctx: &PlanContext<'_, F, T>) -> BenchResult<Report> {
        let dataset = ctx.dataset(&self.spec)?;
        let mut runner = ctx.runner();
        let barrier = ctx.barrier();

        let engine = measure_ingest(
            &mut runner,
            ctx.factory(),
            &barrier,
            dataset,
            ctx.config_with_bins(None),
        )
        .await?;
        let ingest_ms = runner.samples().last().and_then(|s| s.elapsed_ms);

        let timings = match engine {
            Some(engine) => {
                let result = self.exercise(&mut runner, &barrier, &engine).await;
                if let Err(err) = engine.dispose().await {
                    tracing::warn!("{}: dispose failed: {}", self.name, err);
                }
                result?
            }
            None => Timings::default(),
        };

        Ok(Report::Baseline(BaselineReport {
            timestamp: epoch_millis(),
            rows: self.spec.rows,
            dimensions: self.spec.dimensions,
            columnar: self.spec.layout == Layout::Columnar,
            ingest_ms,
            index: Latency { ms: timings.index },
            filter: Latency { ms: timings.filter },
            clear_ms: timings.clear,
            clear_strategy: Some(self.clear),
            samples: runner.into_samples(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LocalEngineFactory;
    use filterbench_core::TokioTimeProvider;

    #[tokio::test]
    async fn test_baseline_report_fields() {
        let factory = LocalEngineFactory::new();
        let ctx = PlanContext::new(&factory, TokioTimeProvider::new(), 5);
        let mut plan = BaselinePlan::new("baseline-columnar", 5_000, 3)
            .layout(Layout::Columnar)
            .clear(ClearStrategy::Recompute);

        let report = BenchmarkPlan::run(&mut plan, &ctx).await.unwrap();
        let Report::Baseline(report) = report else {
            panic!("expected baseline report");
        };
        assert!(report.columnar);
        assert_eq!(report.rows, 5_000);
        assert!(report.ingest_ms.is_some());
        assert!(report.index.ms.is_some());
        assert!(report.filter.ms.is_some());
        assert!(report.clear_ms.is_some());
        let names: Vec<&str> = report.samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Ingest (columnar)", "Build index (dim0)", "Filter (dim0)", "Clear (recompute)"]
        );
    }
}
