//! Suite orchestration.
//!
//! A suite is a fixed, ordered list of named steps. Each step produces one
//! report artifact. The first failing step aborts the suite: later reports
//! are compared against earlier ones, so a missing baseline invalidates
//! everything after it. Artifacts written before the failure stay on disk.
//!
//! Steps run through a [`StepExecutor`], so the orchestrator can be driven
//! by an in-process plan runner ([`InProcessExecutor`]) or by anything that
//! can "run a named step and report pass/fail plus an artifact".
//!
//! A step that exceeds its bound is not dropped on the spot. Its token is
//! cancelled and it gets a grace period to release what it holds (for
//! plans, disposing their engine); only a step that outlives the grace
//! period is abandoned.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use filterbench_core::{BenchError, BenchResult, ClearStrategy, Layout, TimeError, TimeProvider};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::HarnessConfig;
use crate::engine::EngineFactory;
use crate::report::ReportSink;
use crate::runner::{BaselinePlan, BenchmarkPlan, MicroHistogramPlan, MultiFilterPlan, PlanContext};

/// Runs one named step.
#[async_trait(?Send)]
pub trait StepExecutor {
    /// Execute `step` and return the name of the artifact it produced.
    ///
    /// Once `cancel` fires the step should stop issuing work, release its
    /// resources and return.
    async fn execute(&mut self, step: &str, cancel: CancellationToken) -> BenchResult<String>;
}

/// Executes steps by running registered plans and persisting their reports.
///
/// While a step runs, its plan observes the step's cancellation token in
/// place of the context's own. A cancelled step writes no report.
pub struct InProcessExecutor<'a, F: EngineFactory, T: TimeProvider, S: ReportSink> {
    ctx: PlanContext<'a, F, T>,
    plans: Vec<Box<dyn BenchmarkPlan<F, T>>>,
    sink: S,
}

impl<'a, F: EngineFactory, T: TimeProvider, S: ReportSink> InProcessExecutor<'a, F, T, S> {
    /// Create an executor with no plans.
    pub fn new(ctx: PlanContext<'a, F, T>, sink: S) -> Self {
        Self {
            ctx,
            plans: Vec::new(),
            sink,
        }
    }

    /// Register a plan; its name becomes a step label.
    pub fn plan(mut self, plan: Box<dyn BenchmarkPlan<F, T>>) -> Self {
        self.plans.push(plan);
        self
    }

    /// Register several plans.
    pub fn plans(mut self, plans: impl IntoIterator<Item = Box<dyn BenchmarkPlan<F, T>>>) -> Self {
        self.plans.extend(plans);
        self
    }

    /// Step labels, in registration order.
    pub fn step_names(&self) -> Vec<String> {
        self.plans.iter().map(|p| p.name().to_string()).collect()
    }

    /// The sink reports are written to.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[async_trait(?Send)]
impl<F: EngineFactory, T: TimeProvider, S: ReportSink> StepExecutor
    for InProcessExecutor<'_, F, T, S>
{
    async fn execute(&mut self, step: &str, cancel: CancellationToken) -> BenchResult<String> {
        let Some(plan) = self.plans.iter_mut().find(|p| p.name() == step) else {
            return Err(BenchError::InvalidConfig(format!("no plan named '{step}'")));
        };
        let category = plan.category();
        let previous = self.ctx.replace_cancel(cancel.clone());
        let result = plan.run(&self.ctx).await;
        self.ctx.replace_cancel(previous);

        if cancel.is_cancelled() {
            tracing::warn!("Step '{}' cancelled, report discarded", step);
            return Err(BenchError::Cancelled);
        }
        self.sink.write(category, &result?)
    }
}

/// One completed step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Step label.
    pub step: String,
    /// Artifact produced by the step.
    pub artifact: String,
    /// Wall time of the step.
    pub elapsed: Duration,
}

/// Outcome of a fully successful suite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteReport {
    /// Steps in execution order.
    pub steps: Vec<StepRecord>,
    /// Total wall time.
    pub total: Duration,
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Suite Report ===")?;
        writeln!(f, "Steps: {}", self.steps.len())?;
        writeln!(f, "Total Wall Time: {:?}", self.total)?;
        for record in &self.steps {
            writeln!(f, "  {} -> {} ({:?})", record.step, record.artifact, record.elapsed)?;
        }
        Ok(())
    }
}

/// Sequences suite steps with fail-fast semantics.
pub struct SuiteOrchestrator<T: TimeProvider> {
    time: T,
    steps: Vec<String>,
    step_timeout: Option<Duration>,
    cleanup_grace: Duration,
    cancel: CancellationToken,
}

impl<T: TimeProvider> SuiteOrchestrator<T> {
    /// Create an orchestrator with no steps, no step bound and a 10 second
    /// cleanup grace.
    pub fn new(time: T) -> Self {
        Self {
            time,
            steps: Vec::new(),
            step_timeout: None,
            cleanup_grace: Duration::from_secs(10),
            cancel: CancellationToken::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, name: impl Into<String>) -> Self {
        self.steps.push(name.into());
        self
    }

    /// Append several steps.
    pub fn steps<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps.extend(names.into_iter().map(Into::into));
        self
    }

    /// Bound each step's duration.
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// How long a timed-out step may take to wind down after cancellation.
    pub fn cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace = grace;
        self
    }

    /// Cancel the running step and stop before the next once `token` fires.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run every step in order, stopping at the first failure.
    #[instrument(skip_all)]
    pub async fn run<X: StepExecutor>(&self, executor: &mut X) -> BenchResult<SuiteReport> {
        let started = self.time.now();
        let mut report = SuiteReport::default();

        for (i, step) in self.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::error!("Suite cancelled before step '{}'", step);
                return Err(BenchError::StepFailed {
                    step: step.clone(),
                    reason: "suite cancelled".to_string(),
                });
            }

            tracing::info!("[{}/{}] Running step '{}'", i + 1, self.steps.len(), step);
            let step_started = self.time.now();
            let token = self.cancel.child_token();
            let mut execution = executor.execute(step, token.clone());
            let outcome = match self.step_timeout {
                Some(after) => match self.time.timeout(after, &mut execution).await {
                    Ok(outcome) => outcome,
                    Err(TimeError::Elapsed) | Err(TimeError::Shutdown) => {
                        tracing::error!("Step '{}' timed out after {:?}", step, after);
                        token.cancel();
                        if self
                            .time
                            .timeout(self.cleanup_grace, &mut execution)
                            .await
                            .is_err()
                        {
                            tracing::warn!(
                                "Step '{}' still running {:?} after cancellation, abandoning it",
                                step,
                                self.cleanup_grace
                            );
                        }
                        return Err(BenchError::StepTimeout {
                            step: step.clone(),
                            after,
                        });
                    }
                },
                None => execution.await,
            };

            match outcome {
                Ok(artifact) => {
                    let elapsed = self.time.now().saturating_sub(step_started);
                    tracing::info!("Step '{}' wrote {} in {:?}", step, artifact, elapsed);
                    report.steps.push(StepRecord {
                        step: step.clone(),
                        artifact,
                        elapsed,
                    });
                }
                Err(err) => {
                    tracing::error!("Step '{}' failed: {}", step, err);
                    return Err(BenchError::StepFailed {
                        step: step.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        report.total = self.time.now().saturating_sub(started);
        Ok(report)
    }
}

/// The standard suite: six baselines, three multi-filter chains and the
/// histogram micro-benchmark, in that order.
pub fn default_suite<F: EngineFactory, T: TimeProvider>(
    config: &HarnessConfig,
) -> BenchResult<Vec<Box<dyn BenchmarkPlan<F, T>>>> {
    config.validate()?;
    let (rows, large, dims, chain) = (
        config.rows,
        config.large_rows,
        config.dimensions,
        config.chain_length,
    );
    let plans: Vec<Box<dyn BenchmarkPlan<F, T>>> = vec![
        Box::new(BaselinePlan::new("baseline-rows", rows, dims)),
        Box::new(BaselinePlan::new("baseline-columnar", rows, dims).layout(Layout::Columnar)),
        Box::new(
            BaselinePlan::new("baseline-clear-delta", rows, dims)
                .layout(Layout::Columnar)
                .clear(ClearStrategy::Delta),
        ),
        Box::new(
            BaselinePlan::new("baseline-clear-recompute", rows, dims)
                .layout(Layout::Columnar)
                .clear(ClearStrategy::Recompute),
        ),
        Box::new(BaselinePlan::new("baseline-rows-large", large, dims)),
        Box::new(
            BaselinePlan::new("baseline-columnar-large", large, dims).layout(Layout::Columnar),
        ),
        Box::new(MultiFilterPlan::rows(rows, dims, chain)?),
        Box::new(MultiFilterPlan::columnar(rows, dims, chain)?),
        Box::new(MultiFilterPlan::wide_profile(rows, dims, chain)?),
        Box::new(MicroHistogramPlan::new(rows)),
    ];
    Ok(plans)
}
