//! Benchmark runner and plans.
//!
//! [`BenchmarkRunner::measure`] times one named operation, including every
//! settle the operation performs, and appends a [`TimingSample`]. Plans
//! ([`BaselinePlan`], [`MultiFilterPlan`], [`MicroHistogramPlan`]) string
//! measurements together into one [`Report`](crate::report::Report).
//!
//! Measurements against one engine never overlap: `measure` takes the
//! runner mutably and awaits the operation to completion before returning.
//! Once an operation fails in a way that may leave the engine busy (a settle
//! that timed out or was cancelled), the runner stops polling operations:
//! every later `measure` records a failed sample without issuing anything.

mod baseline;
mod context;
mod micro;
mod multi;
mod plan;

use std::future::Future;
use std::ops::Range;

use filterbench_core::{BenchResult, Dataset, DatasetSpec, TimeProvider};

use crate::barrier::QuiescenceBarrier;
use crate::engine::{Engine, EngineConfig, EngineFactory};
use crate::report::TimingSample;

pub use baseline::BaselinePlan;
pub use context::PlanContext;
pub use micro::MicroHistogramPlan;
pub use multi::MultiFilterPlan;
pub use plan::BenchmarkPlan;

/// Result of one measured operation.
#[derive(Debug, Clone)]
pub struct Measurement<O> {
    /// The recorded sample.
    pub sample: TimingSample,
    /// The operation's output; `None` if it failed.
    pub output: Option<O>,
}

impl<O> Measurement<O> {
    /// Elapsed milliseconds, if the operation succeeded.
    pub fn elapsed_ms(&self) -> Option<f64> {
        self.sample.elapsed_ms
    }
}

/// Times named operations and collects their samples.
#[derive(Debug)]
pub struct BenchmarkRunner<T: TimeProvider> {
    time: T,
    abort_on_first_failure: bool,
    samples: Vec<TimingSample>,
    /// Sample whose failure may have left work running on the engine.
    unsettled: Option<String>,
}

impl<T: TimeProvider> BenchmarkRunner<T> {
    /// Create a partial-failure tolerant runner.
    pub fn new(time: T) -> Self {
        Self {
            time,
            abort_on_first_failure: false,
            samples: Vec::new(),
            unsettled: None,
        }
    }

    /// Return the first failure instead of recording it and carrying on.
    pub fn abort_on_first_failure(mut self, abort: bool) -> Self {
        self.abort_on_first_failure = abort;
        self
    }

    /// Await `operation` and record how long it took under `name`.
    ///
    /// A failed operation is recorded with an error marker. The runner then
    /// returns `Ok` with no output, or the error itself when configured to
    /// abort on the first failure.
    ///
    /// If an earlier operation left the engine busy, `operation` is dropped
    /// without being polled and a skipped sample is recorded instead.
    pub async fn measure<O, F>(
        &mut self,
        name: impl Into<String>,
        dataset_size: usize,
        operation: F,
    ) -> BenchResult<Measurement<O>>
    where
        F: Future<Output = BenchResult<O>>,
    {
        let name = name.into();
        if let Some(culprit) = &self.unsettled {
            let reason = format!("skipped: engine still busy after '{culprit}'");
            let sample = TimingSample::failed(name, dataset_size, reason);
            tracing::warn!("{}", sample);
            self.samples.push(sample.clone());
            return Ok(Measurement {
                sample,
                output: None,
            });
        }

        let start = self.time.now();
        let result = operation.await;
        let elapsed = self.time.now().saturating_sub(start);

        match result {
            Ok(output) => {
                let sample =
                    TimingSample::succeeded(name, dataset_size, elapsed.as_secs_f64() * 1000.0);
                tracing::info!("{}", sample);
                self.samples.push(sample.clone());
                Ok(Measurement {
                    sample,
                    output: Some(output),
                })
            }
            Err(err) => {
                if err.leaves_engine_busy() {
                    self.unsettled = Some(name.clone());
                }
                let sample = TimingSample::failed(name, dataset_size, err.to_string());
                tracing::warn!("{}", sample);
                self.samples.push(sample.clone());
                if self.abort_on_first_failure {
                    Err(err)
                } else {
                    Ok(Measurement {
                        sample,
                        output: None,
                    })
                }
            }
        }
    }

    /// False once a failed operation may have left the engine busy.
    pub fn is_settled(&self) -> bool {
        self.unsettled.is_none()
    }

    /// Samples recorded so far, in measurement order.
    pub fn samples(&self) -> &[TimingSample] {
        &self.samples
    }

    /// Take the recorded samples.
    pub fn into_samples(self) -> Vec<TimingSample> {
        self.samples
    }
}

/// Measure ingest of `dataset` as `Ingest (<layout>)`.
///
/// The timer covers engine creation and the settle that follows it. Returns
/// the settled engine, or `None` when ingest failed and the runner is
/// tolerant. An engine that was created but failed to settle is disposed
/// before the failure is reported.
pub async fn measure_ingest<F, T>(
    runner: &mut BenchmarkRunner<T>,
    factory: &F,
    barrier: &QuiescenceBarrier<T>,
    dataset: Dataset,
    config: EngineConfig,
) -> BenchResult<Option<F::Engine>>
where
    F: EngineFactory,
    T: TimeProvider,
{
    let rows = dataset.row_count();
    let name = format!("Ingest ({})", dataset.layout().label());
    let measurement = runner
        .measure(name, rows, async {
            let engine = factory.create(dataset, config).await?;
            match barrier.settle(&engine).await {
                Ok(()) => Ok(engine),
                Err(err) => {
                    if let Err(dispose_err) = engine.dispose().await {
                        tracing::warn!("Dispose after failed ingest: {}", dispose_err);
                    }
                    Err(err)
                }
            }
        })
        .await?;
    Ok(measurement.output)
}

/// The slice `[lo, hi)` of the spec's value range, given as fractions of it.
pub(crate) fn window(spec: &DatasetSpec, lo: f64, hi: f64) -> Range<f64> {
    let span = spec.max - spec.min;
    (spec.min + span * lo)..(spec.min + span * hi)
}
