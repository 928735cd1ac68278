//! Test doubles: engines that never or slowly settle, and a scripted step
//! executor.

use std::cell::{Cell, RefCell};
use std::ops::Range;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use filterbench::{DimensionHandle, Engine, EngineConfig, EngineFactory, ShardSummary, StepExecutor};
use filterbench_core::{BenchError, BenchResult, ClearStrategy, Command, Dataset};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Engine whose ingest never completes.
pub struct StuckEngine {
    disposed: Rc<Cell<bool>>,
}

pub struct StuckDimension(String);

impl DimensionHandle for StuckDimension {
    fn name(&self) -> &str {
        &self.0
    }

    fn filter(&self, _range: Range<f64>) -> BenchResult<()> {
        Ok(())
    }

    fn clear(&self, _strategy: ClearStrategy) -> BenchResult<()> {
        Ok(())
    }
}

#[async_trait(?Send)]
impl Engine for StuckEngine {
    type Dimension = StuckDimension;

    async fn dimension(&self, name: &str) -> BenchResult<StuckDimension> {
        Ok(StuckDimension(name.to_string()))
    }

    async fn build_index(&self, _name: &str) -> BenchResult<()> {
        Ok(())
    }

    fn submit(&self, _command: Command) -> BenchResult<()> {
        Ok(())
    }

    async fn when_idle(&self) -> BenchResult<()> {
        std::future::pending().await
    }

    async fn active_count(&self) -> BenchResult<usize> {
        Ok(0)
    }

    async fn shard_summary(&self) -> BenchResult<ShardSummary> {
        Ok(ShardSummary::default())
    }

    async fn dispose(&self) -> BenchResult<()> {
        self.disposed.set(true);
        Ok(())
    }
}

/// Factory for [`StuckEngine`]s; records whether the last one was disposed.
#[derive(Default)]
pub struct StuckFactory {
    pub disposed: Rc<Cell<bool>>,
}

#[async_trait(?Send)]
impl EngineFactory for StuckFactory {
    type Engine = StuckEngine;

    fn name(&self) -> &str {
        "stuck"
    }

    async fn create(&self, _dataset: Dataset, _config: EngineConfig) -> BenchResult<StuckEngine> {
        Ok(StuckEngine {
            disposed: Rc::clone(&self.disposed),
        })
    }
}

/// What a [`SlowEngine`] saw, shared with the test.
pub struct SlowLog {
    filter_cost: Duration,
    busy_until: Cell<Option<Instant>>,
    /// Every call other than `dispose`, in order.
    pub calls: RefCell<Vec<String>>,
    /// Calls that arrived while earlier work was still running.
    pub issued_while_busy: Cell<usize>,
    pub disposed: Cell<bool>,
}

impl SlowLog {
    fn record(&self, call: String) {
        if self.busy_until.get().is_some_and(|until| Instant::now() < until) {
            self.issued_while_busy.set(self.issued_while_busy.get() + 1);
        }
        self.calls.borrow_mut().push(call);
    }
}

/// Engine whose filters keep it busy for a fixed time; everything else is instant.
pub struct SlowEngine {
    log: Rc<SlowLog>,
}

pub struct SlowDimension {
    name: String,
    log: Rc<SlowLog>,
}

impl DimensionHandle for SlowDimension {
    fn name(&self) -> &str {
        &self.name
    }

    fn filter(&self, _range: Range<f64>) -> BenchResult<()> {
        self.log.record(format!("filter {}", self.name));
        self.log
            .busy_until
            .set(Some(Instant::now() + self.log.filter_cost));
        Ok(())
    }

    fn clear(&self, _strategy: ClearStrategy) -> BenchResult<()> {
        self.log.record(format!("clear {}", self.name));
        Ok(())
    }
}

#[async_trait(?Send)]
impl Engine for SlowEngine {
    type Dimension = SlowDimension;

    async fn dimension(&self, name: &str) -> BenchResult<SlowDimension> {
        self.log.record(format!("dimension {name}"));
        Ok(SlowDimension {
            name: name.to_string(),
            log: Rc::clone(&self.log),
        })
    }

    async fn build_index(&self, name: &str) -> BenchResult<()> {
        self.log.record(format!("build_index {name}"));
        Ok(())
    }

    fn submit(&self, command: Command) -> BenchResult<()> {
        self.log.record(format!("submit {}", command.dim_id()));
        Ok(())
    }

    async fn when_idle(&self) -> BenchResult<()> {
        if let Some(until) = self.log.busy_until.get() {
            tokio::time::sleep_until(until).await;
        }
        Ok(())
    }

    async fn active_count(&self) -> BenchResult<usize> {
        self.log.record("active_count".to_string());
        Ok(0)
    }

    async fn shard_summary(&self) -> BenchResult<ShardSummary> {
        self.log.record("shard_summary".to_string());
        Ok(ShardSummary::default())
    }

    async fn dispose(&self) -> BenchResult<()> {
        self.log.disposed.set(true);
        Ok(())
    }
}

/// Factory for [`SlowEngine`]s sharing one [`SlowLog`].
pub struct SlowFactory {
    pub log: Rc<SlowLog>,
}

impl SlowFactory {
    pub fn new(filter_cost: Duration) -> Self {
        Self {
            log: Rc::new(SlowLog {
                filter_cost,
                busy_until: Cell::new(None),
                calls: RefCell::new(Vec::new()),
                issued_while_busy: Cell::new(0),
                disposed: Cell::new(false),
            }),
        }
    }
}

#[async_trait(?Send)]
impl EngineFactory for SlowFactory {
    type Engine = SlowEngine;

    fn name(&self) -> &str {
        "slow"
    }

    async fn create(&self, _dataset: Dataset, _config: EngineConfig) -> BenchResult<SlowEngine> {
        Ok(SlowEngine {
            log: Rc::clone(&self.log),
        })
    }
}

/// Executor that fails (or hangs) on chosen steps and records what ran.
#[derive(Default)]
pub struct ScriptedExecutor {
    pub fail_on: Option<String>,
    pub hang_on: Option<String>,
    pub executed: Vec<String>,
}

#[async_trait(?Send)]
impl StepExecutor for ScriptedExecutor {
    async fn execute(&mut self, step: &str, _cancel: CancellationToken) -> BenchResult<String> {
        self.executed.push(step.to_string());
        if self.hang_on.as_deref() == Some(step) {
            std::future::pending::<()>().await;
        }
        if self.fail_on.as_deref() == Some(step) {
            return Err(BenchError::InvalidConfig("exit status 1".to_string()));
        }
        Ok(format!("{step}-1.json"))
    }
}
