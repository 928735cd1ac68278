//! Engine control facade.
//!
//! The harness drives an engine only through these traits:
//!
//! | Operation | Trait method | Completes when |
//! |-----------|--------------|----------------|
//! | create | [`EngineFactory::create`] | handle returned; ingest still in flight |
//! | dimension lookup | [`Engine::dimension`] | engine acknowledges the name |
//! | index build | [`Engine::build_index`] | engine acknowledges the build |
//! | filter / clear | [`DimensionHandle::filter`], [`DimensionHandle::clear`] | issued only |
//! | quiescence | [`Engine::when_idle`] | all issued work applied and reclaimed |
//! | teardown | [`Engine::dispose`] | engine resources released |
//!
//! `filter` and `clear` are fire-and-forget: their effects are observable only
//! after `when_idle`. After `dispose`, every operation on the handle (and on
//! dimension handles obtained from it) fails with
//! [`BenchError::HandleClosed`](filterbench_core::BenchError::HandleClosed).

pub mod local;
pub mod shard;
mod worker;

use std::ops::Range;

use async_trait::async_trait;
use filterbench_core::{BenchResult, ClearStrategy, Command, Dataset};

use crate::report::ShardSummary;

pub use local::{LocalDimension, LocalEngine, LocalEngineFactory};
pub use shard::ShardMetrics;

/// Bin count used when [`EngineConfig::bins`] is unset.
pub const DEFAULT_BINS: u16 = 4096;

/// Options passed to [`EngineFactory::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Histogram bins per dimension; `None` uses [`DEFAULT_BINS`].
    pub bins: Option<u16>,
    /// Run a reclamation cycle after this many mutating commands (0 disables).
    pub reclaim_every: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bins: None,
            reclaim_every: 1,
        }
    }
}

impl EngineConfig {
    /// Set the histogram bin count.
    pub fn with_bins(mut self, bins: u16) -> Self {
        self.bins = Some(bins);
        self
    }

    /// Set the reclamation cadence.
    pub fn with_reclaim_every(mut self, every: usize) -> Self {
        self.reclaim_every = every;
        self
    }

    /// Effective bin count.
    pub fn bin_count(&self) -> u16 {
        self.bins.unwrap_or(DEFAULT_BINS)
    }
}

/// Creates engine instances from datasets.
#[async_trait(?Send)]
pub trait EngineFactory {
    /// Engine handle type produced by this factory.
    type Engine: Engine;

    /// Name of the engine, used in logs.
    fn name(&self) -> &str;

    /// Start ingesting `dataset`. Ingest completes asynchronously; await
    /// [`Engine::when_idle`] before relying on it.
    async fn create(&self, dataset: Dataset, config: EngineConfig) -> BenchResult<Self::Engine>;
}

/// Handle to one running engine instance.
///
/// One driver owns one handle; concurrent mutation from two drivers is not
/// supported.
#[async_trait(?Send)]
pub trait Engine {
    /// Per-dimension handle type.
    type Dimension: DimensionHandle;

    /// Resolve a dimension by name.
    async fn dimension(&self, name: &str) -> BenchResult<Self::Dimension>;

    /// Build the sorted index for a dimension and wait for the acknowledgement.
    async fn build_index(&self, name: &str) -> BenchResult<()>;

    /// Issue a raw protocol command. Fire-and-forget.
    fn submit(&self, command: Command) -> BenchResult<()>;

    /// Resolve once all issued work, including background reclamation, is done.
    async fn when_idle(&self) -> BenchResult<()>;

    /// Number of rows passing every active filter.
    async fn active_count(&self) -> BenchResult<usize>;

    /// Reclamation counters accumulated since creation.
    async fn shard_summary(&self) -> BenchResult<ShardSummary>;

    /// Release all engine-side resources.
    async fn dispose(&self) -> BenchResult<()>;
}

/// Handle to one dimension of an engine.
pub trait DimensionHandle {
    /// Dimension name.
    fn name(&self) -> &str;

    /// Restrict the dimension to `[range.start, range.end)`. Fire-and-forget.
    fn filter(&self, range: Range<f64>) -> BenchResult<()>;

    /// Remove the dimension's filter. Fire-and-forget.
    fn clear(&self, strategy: ClearStrategy) -> BenchResult<()>;
}
