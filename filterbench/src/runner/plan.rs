//! Benchmark plan trait.

use async_trait::async_trait;
use filterbench_core::{BenchResult, TimeProvider};

use super::PlanContext;
use crate::engine::EngineFactory;
use crate::report::{Report, ReportCategory};

/// A named benchmark producing one report per run.
///
/// Plans own the engines they create and must dispose them before
/// returning, whether the run succeeded or not.
#[async_trait(?Send)]
pub trait BenchmarkPlan<F: EngineFactory, T: TimeProvider> {
    /// Plan name, used as the suite step label.
    fn name(&self) -> &str;

    /// Category the report is filed under.
    fn category(&self) -> ReportCategory;

    /// Execute the plan.
    async fn run(&mut self, ctx: &PlanContext<'_, F, T>) -> BenchResult<Report>;
}
