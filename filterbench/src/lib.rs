//! # filterbench
//!
//! Benchmark and scenario harness for worker-based columnar filtering engines.
//!
//! The engine under test runs off the calling task and is reached only
//! through an asynchronous command protocol. Timing such an engine is easy
//! to get wrong: a timer stopped when a command is *issued* rather than
//! *applied* produces numbers that look fine and mean nothing. Every
//! measurement here therefore ends with a quiescence wait.
//!
//! ## Core Components
//!
//! - [`engine`]: the control facade traits and [`LocalEngine`], an in-process
//!   reference engine
//! - [`barrier`]: idle tracking and the bounded [`QuiescenceBarrier`]
//! - [`scenario`]: lazy command scripts, composition and replay
//! - [`runner`]: [`BenchmarkRunner`] and the benchmark plans
//! - [`report`]: report shapes, categories and sinks
//! - [`suite`]: fail-fast [`SuiteOrchestrator`]
//! - [`aggregate`]: [`ReportAggregator`] producing `summary.json`
//!
//! ## Quick Start
//!
//! ```rust
//! use filterbench::{BenchmarkRunner, Engine, LocalEngineFactory, QuiescenceBarrier};
//! use filterbench::engine::{EngineConfig, EngineFactory};
//! use filterbench_core::{DatasetGenerator, DatasetSpec, Layout, SeededRandomProvider, TokioTimeProvider};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> filterbench_core::BenchResult<()> {
//! let spec = DatasetSpec::new(10_000, 4).layout(Layout::Columnar);
//! let dataset = DatasetGenerator::new(SeededRandomProvider::new(1)).generate(&spec)?;
//!
//! let time = TokioTimeProvider::new();
//! let barrier = QuiescenceBarrier::new(time.clone(), Duration::from_secs(10));
//! let mut runner = BenchmarkRunner::new(time);
//!
//! let engine = LocalEngineFactory::new().create(dataset, EngineConfig::default()).await?;
//! runner.measure("Ingest (columnar)", 10_000, barrier.settle(&engine)).await?;
//! engine.dispose().await?;
//! assert_eq!(runner.samples().len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod aggregate;
pub mod barrier;
pub mod config;
pub mod display;
pub mod engine;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod suite;

pub use aggregate::{ReportAggregator, ReportEntry, SummaryRow, write_summary};
pub use barrier::{IdleBarrier, IdleTracker, QuiescenceBarrier};
pub use config::HarnessConfig;
pub use engine::{
    DimensionHandle, Engine, EngineConfig, EngineFactory, LocalEngine, LocalEngineFactory,
};
pub use report::{Report, ReportCategory, ReportSink, ShardSummary, TimingSample};
pub use runner::{BenchmarkPlan, BenchmarkRunner, Measurement, PlanContext, measure_ingest};
pub use scenario::{Scenario, ScenarioDriver, ScenarioRegistry};
pub use suite::{InProcessExecutor, StepExecutor, SuiteOrchestrator, SuiteReport, default_suite};
