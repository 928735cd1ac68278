//! Multi-filter chain plan.

use async_trait::async_trait;
use filterbench_core::{
    BenchError, BenchResult, ClearStrategy, DatasetSpec, Layout, TimeProvider, dimension_name,
};

use super::{BenchmarkPlan, BenchmarkRunner, PlanContext, measure_ingest, window};
use crate::barrier::QuiescenceBarrier;
use crate::engine::{DimensionHandle, Engine, EngineFactory};
use crate::report::{ChainEntry, MultiFilterReport, Report, ReportCategory, ShardSummary, epoch_millis};
use crate::scenario::{BrushSweep, ScenarioDriver};

/// Bin count used by the wide-histogram profile.
pub const WIDE_PROFILE_BINS: u16 = 16_384;

/// Filter several dimensions in turn, then clear them in reverse.
///
/// Each link of the chain is indexed before it is filtered; only the filter
/// and clear latencies appear in the chains, the index builds are kept as
/// plain samples. After the clear chain a brush sweep is replayed on `dim0`
/// and timed as `Brush sweep (dim0)`, and the engine's shard summary is
/// captured last. Nothing is issued after a step leaves the engine busy; the
/// remaining steps are reported as failed and the summary is omitted.
#[derive(Debug, Clone)]
pub struct MultiFilterPlan {
    name: String,
    category: ReportCategory,
    spec: DatasetSpec,
    chain_length: usize,
    bins: Option<u16>,
}

#[derive(Debug, Default)]
struct Chains {
    filters: Vec<ChainEntry>,
    clears: Vec<ChainEntry>,
    shard_summary: Option<ShardSummary>,
}

impl MultiFilterPlan {
    fn with(
        name: String,
        category: ReportCategory,
        spec: DatasetSpec,
        chain_length: usize,
        bins: Option<u16>,
    ) -> BenchResult<Self> {
        if chain_length == 0 || chain_length > spec.dimensions {
            return Err(BenchError::InvalidConfig(format!(
                "chain length must be between 1 and {}, got {}",
                spec.dimensions, chain_length
            )));
        }
        Ok(Self {
            name,
            category,
            spec,
            chain_length,
            bins,
        })
    }

    /// Chain over row-form input (`multi-rows`).
    pub fn rows(rows: usize, dimensions: usize, chain_length: usize) -> BenchResult<Self> {
        Self::with(
            "multi-rows".to_string(),
            ReportCategory::MultiRows,
            DatasetSpec::new(rows, dimensions),
            chain_length,
            None,
        )
    }

    /// Chain over columnar input (`multi-columnar`).
    pub fn columnar(rows: usize, dimensions: usize, chain_length: usize) -> BenchResult<Self> {
        Self::with(
            "multi-columnar".to_string(),
            ReportCategory::MultiColumnar,
            DatasetSpec::new(rows, dimensions).layout(Layout::Columnar),
            chain_length,
            None,
        )
    }

    /// Columnar chain with the wide-histogram engine profile (`multi-simd-profile`).
    pub fn wide_profile(rows: usize, dimensions: usize, chain_length: usize) -> BenchResult<Self> {
        Self::with(
            "multi-simd-profile".to_string(),
            ReportCategory::MultiSimdProfile,
            DatasetSpec::new(rows, dimensions).layout(Layout::Columnar),
            chain_length,
            Some(WIDE_PROFILE_BINS),
        )
    }

    async fn exercise<E: Engine, T: TimeProvider>(
        &self,
        ctx: &PlanContext<'_, impl EngineFactory, T>,
        runner: &mut BenchmarkRunner<T>,
        barrier: &QuiescenceBarrier<T>,
        engine: &E,
    ) -> BenchResult<Chains> {
        let rows = self.spec.rows;
        let mut chains = Chains::default();
        let mut handles = Vec::with_capacity(self.chain_length);
        for i in 0..self.chain_length {
            handles.push(engine.dimension(&dimension_name(i)).await?);
        }

        for dim in &handles {
            let name = dim.name();
            runner
                .measure(format!("Build index ({name})"), rows, async {
                    engine.build_index(name).await?;
                    barrier.settle(engine).await
                })
                .await?;

            let range = window(&self.spec, 0.25, 0.75);
            let filter = runner
                .measure(format!("Filter ({name})"), rows, async {
                    dim.filter(range)?;
                    barrier.settle(engine).await
                })
                .await?;
            chains.filters.push(ChainEntry {
                dim: name.to_string(),
                ms: filter.elapsed_ms(),
            });
        }

        for dim in handles.iter().rev() {
            let clear = runner
                .measure(format!("Clear ({})", dim.name()), rows, async {
                    dim.clear(ClearStrategy::Delta)?;
                    barrier.settle(engine).await
                })
                .await?;
            chains.clears.push(ChainEntry {
                dim: dim.name().to_string(),
                ms: clear.elapsed_ms(),
            });
        }

        let sweep_dim = dimension_name(0);
        let driver = ScenarioDriver::new(engine, ctx.time().clone(), ctx.settle_timeout())
            .cancel_token(ctx.cancel().clone());
        runner
            .measure(format!("Brush sweep ({sweep_dim})"), rows, async {
                driver.replay(&BrushSweep::new(sweep_dim.clone())).await
            })
            .await?;

        if !runner.is_settled() {
            tracing::warn!("{}: engine never settled, no shard summary", self.name);
            return Ok(chains);
        }
        chains.shard_summary = match engine.shard_summary().await {
            Ok(summary) => Some(summary),
            Err(err) => {
                tracing::warn!("{}: no shard summary: {}", self.name, err);
                None
            }
        };
        Ok(chains)
    }
}

#[async_trait(?Send)]
impl<F: EngineFactory, T: TimeProvider> BenchmarkPlan<F, T> for MultiFilterPlan {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ReportCategory {
        self.category
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
            ctx.config_with_bins(self.bins),
        )
        .await?;
        let ingest_ms = runner.samples().last().and_then(|s| s.elapsed_ms);

        let chains = match engine {
            Some(engine) => {
                let result = self.exercise(ctx, &mut runner, &barrier, &engine).await;
                if let Err(err) = engine.dispose().await {
                    tracing::warn!("{}: dispose failed: {}", self.name, err);
                }
                result?
            }
            None => Chains::default(),
        };

        Ok(Report::MultiFilter(MultiFilterReport {
            timestamp: epoch_millis(),
            rows: self.spec.rows,
            dimensions: self.spec.dimensions,
            columnar: self.spec.layout == Layout::Columnar,
            ingest_ms,
            filters: chains.filters,
            clears: chains.clears,
            shard_summary: chains.shard_summary,
            samples: runner.into_samples(),
        }))
    }
}
