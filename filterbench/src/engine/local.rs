//! In-process reference engine.
//!
//! [`LocalEngine`] runs the engine worker as a Tokio task and talks to it over
//! an unbounded channel, mirroring the command/acknowledgement protocol of an
//! out-of-process worker. The harness tests and the bundled suite run against
//! it; other engines plug in through the same traits.

use std::cell::{Cell, RefCell};
use std::ops::Range;
use std::rc::Rc;

use async_trait::async_trait;
use filterbench_core::{BenchError, BenchResult, ClearStrategy, Command, Dataset};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::worker::{self, MAX_DIMENSIONS, Request};
use super::{DimensionHandle, Engine, EngineConfig, EngineFactory};
use crate::barrier::{IdleBarrier, IdleTracker};
use crate::report::ShardSummary;

/// State shared between an engine handle and its dimension handles.
struct Shared {
    tx: mpsc::UnboundedSender<Request>,
    tracker: IdleTracker,
    closed: Cell<bool>,
    next_seq: Cell<u64>,
}

impl Shared {
    fn ensure_open(&self) -> BenchResult<()> {
        if self.closed.get() {
            Err(BenchError::HandleClosed)
        } else {
            Ok(())
        }
    }

    fn send(&self, request: Request) -> BenchResult<()> {
        self.ensure_open()?;
        self.tx.send(request).map_err(|_| BenchError::EngineGone)
    }

    /// Send a request that mutates engine state, counting it in flight first.
    fn send_mutating(&self, request: Request) -> BenchResult<()> {
        self.ensure_open()?;
        self.tracker.begin();
        if self.tx.send(request).is_err() {
            self.tracker.complete(false);
            return Err(BenchError::EngineGone);
        }
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        seq
    }
}

/// Handle to an in-process engine worker.
pub struct LocalEngine {
    shared: Rc<Shared>,
    barrier: IdleBarrier,
    dimensions: Vec<String>,
    worker: RefCell<Option<JoinHandle<()>>>,
}

impl LocalEngine {
    /// Spawn a worker and start ingesting `dataset`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(dataset: Dataset, config: EngineConfig) -> BenchResult<Self> {
        let dimensions: Vec<String> = dataset
            .dimension_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        if dimensions.len() > MAX_DIMENSIONS {
            return Err(BenchError::InvalidConfig(format!(
                "at most {} dimensions are supported, got {}",
                MAX_DIMENSIONS,
                dimensions.len()
            )));
        }
        if config.bin_count() == 0 {
            return Err(BenchError::InvalidConfig(
                "bins must be greater than zero".to_string(),
            ));
        }

        let tracker = IdleTracker::new();
        let barrier = tracker.barrier();
        let (tx, rx) = mpsc::unbounded_channel();

        // ingest counts as in flight until the worker has built its store
        tracker.begin();
        let handle = tokio::spawn(worker::run(dataset, config, rx, tracker.clone()));

        Ok(Self {
            shared: Rc::new(Shared {
                tx,
                tracker,
                closed: Cell::new(false),
                next_seq: Cell::new(0),
            }),
            barrier,
            dimensions,
            worker: RefCell::new(Some(handle)),
        })
    }

    /// Dimension names known to this engine.
    pub fn dimension_names(&self) -> &[String] {
        &self.dimensions
    }

    fn check_dimension(&self, name: &str) -> BenchResult<()> {
        if self.dimensions.iter().any(|d| d == name) {
            Ok(())
        } else {
            Err(BenchError::UnknownDimension(name.to_string()))
        }
    }

    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> BenchResult<T> {
        let (reply, rx) = oneshot::channel();
        self.shared.send(make(reply))?;
        rx.await.map_err(|_| BenchError::EngineGone)
    }
}

#[async_trait(?Send)]
impl Engine for LocalEngine {
    type Dimension = LocalDimension;

    async fn dimension(&self, name: &str) -> BenchResult<LocalDimension> {
        let known = self
            .ask(|reply| Request::Resolve {
                name: name.to_string(),
                reply,
            })
            .await?;
        if !known {
            return Err(BenchError::UnknownDimension(name.to_string()));
        }
        Ok(LocalDimension {
            name: name.to_string(),
            shared: Rc::clone(&self.shared),
        })
    }

    async fn build_index(&self, name: &str) -> BenchResult<()> {
        self.check_dimension(name)?;
        let (reply, rx) = oneshot::channel();
        self.shared.send_mutating(Request::BuildIndex {
            name: name.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| BenchError::EngineGone)?
    }

    fn submit(&self, command: Command) -> BenchResult<()> {
        self.shared.ensure_open()?;
        self.check_dimension(command.dim_id())?;
        tracing::debug!("Submitting {} seq={}", command.tag(), command.seq());
        self.shared.send_mutating(Request::Apply(command))
    }

    async fn when_idle(&self) -> BenchResult<()> {
        self.shared.ensure_open()?;
        self.barrier.wait().await
    }

    async fn active_count(&self) -> BenchResult<usize> {
        self.ask(|reply| Request::ActiveCount { reply }).await
    }

    async fn shard_summary(&self) -> BenchResult<ShardSummary> {
        self.ask(|reply| Request::ShardSummary { reply }).await
    }

    async fn dispose(&self) -> BenchResult<()> {
        self.shared.ensure_open()?;
        // shutdown is queued behind anything already issued
        let _ = self.shared.tx.send(Request::Shutdown);
        self.shared.closed.set(true);
        let handle = self.worker.borrow_mut().take();
        if let Some(handle) = handle
            && handle.await.is_err()
        {
            tracing::warn!("Engine worker panicked before dispose");
        }
        Ok(())
    }
}

/// Dimension handle of a [`LocalEngine`].
pub struct LocalDimension {
    name: String,
    shared: Rc<Shared>,
}

impl DimensionHandle for LocalDimension {
    fn name(&self) -> &str {
        &self.name
    }

    fn filter(&self, range: Range<f64>) -> BenchResult<()> {
        let seq = self.shared.next_seq();
        self.shared.send_mutating(Request::Apply(Command::filter_set(
            self.name.clone(),
            range.start,
            range.end,
            seq,
        )))
    }

    fn clear(&self, strategy: ClearStrategy) -> BenchResult<()> {
        let seq = self.shared.next_seq();
        self.shared.send_mutating(Request::Apply(Command::filter_clear(
            self.name.clone(),
            strategy,
            seq,
        )))
    }
}

/// Factory producing [`LocalEngine`]s.
#[derive(Debug, Clone, Default)]
pub struct LocalEngineFactory;

impl LocalEngineFactory {
    /// Create a factory.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl EngineFactory for LocalEngineFactory {
    type Engine = LocalEngine;

    fn name(&self) -> &str {
        "local"
    }

    async fn create(&self, dataset: Dataset, config: EngineConfig) -> BenchResult<LocalEngine> {
        LocalEngine::spawn(dataset, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filterbench_core::{DatasetGenerator, DatasetSpec, Layout, SeededRandomProvider};

    fn dataset(rows: usize, dims: usize) -> Dataset {
        DatasetGenerator::new(SeededRandomProvider::new(5))
            .generate(&DatasetSpec::new(rows, dims).layout(Layout::Columnar))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_then_count() {
        let engine = LocalEngine::spawn(dataset(1000, 3), EngineConfig::default()).unwrap();
        engine.when_idle().await.unwrap();
        assert_eq!(engine.active_count().await.unwrap(), 1000);
        engine.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_after_dispose_fail() {
        let engine = LocalEngine::spawn(dataset(10, 2), EngineConfig::default()).unwrap();
        let dim = engine.dimension("dim0").await.unwrap();
        engine.dispose().await.unwrap();

        assert!(matches!(dim.filter(0.0..1.0), Err(BenchError::HandleClosed)));
        assert!(matches!(engine.when_idle().await, Err(BenchError::HandleClosed)));
        assert!(matches!(engine.build_index("dim0").await, Err(BenchError::HandleClosed)));
        assert!(matches!(engine.active_count().await, Err(BenchError::HandleClosed)));
        assert!(matches!(engine.dispose().await, Err(BenchError::HandleClosed)));
    }

    #[tokio::test]
    async fn test_unknown_dimension() {
        let engine = LocalEngine::spawn(dataset(10, 2), EngineConfig::default()).unwrap();
        assert!(matches!(
            engine.dimension("nope").await,
            Err(BenchError::UnknownDimension(_))
        ));
        assert!(matches!(
            engine.submit(Command::filter_set("nope", 0.0, 1.0, 0)),
            Err(BenchError::UnknownDimension(_))
        ));
        engine.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_too_many_dimensions_rejected() {
        assert!(matches!(
            LocalEngine::spawn(dataset(1, 65), EngineConfig::default()),
            Err(BenchError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_reclamation_feeds_shard_summary() {
        let engine = LocalEngine::spawn(dataset(5000, 2), EngineConfig::default()).unwrap();
        let dim = engine.dimension("dim1").await.unwrap();
        dim.filter(0.0..500.0).unwrap();
        engine.when_idle().await.unwrap();
        let summary = engine.shard_summary().await.unwrap();
        let active = engine.active_count().await.unwrap();
        assert!(summary.total_flushes > 0);
        assert_eq!(summary.total_rows, active as u64);
        engine.dispose().await.unwrap();
    }
}
