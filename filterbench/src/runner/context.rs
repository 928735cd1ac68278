//! Shared inputs for benchmark plans.

use std::time::Duration;

use filterbench_core::{
    BenchResult, Dataset, DatasetGenerator, DatasetSpec, SeededRandomProvider, TimeProvider,
};
use tokio_util::sync::CancellationToken;

use super::BenchmarkRunner;
use crate::barrier::QuiescenceBarrier;
use crate::engine::{EngineConfig, EngineFactory};

/// Everything a plan needs to create engines and time them.
pub struct PlanContext<'a, F: EngineFactory, T: TimeProvider> {
    factory: &'a F,
    time: T,
    seed: u64,
    idle_timeout: Duration,
    engine_config: EngineConfig,
    abort_on_first_failure: bool,
    cancel: CancellationToken,
}

impl<'a, F: EngineFactory, T: TimeProvider> PlanContext<'a, F, T> {
    /// Context with default engine options and a 30 second idle bound.
    pub fn new(factory: &'a F, time: T, seed: u64) -> Self {
        Self {
            factory,
            time,
            seed,
            idle_timeout: Duration::from_secs(30),
            engine_config: EngineConfig::default(),
            abort_on_first_failure: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound on every settle.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Options passed to every engine the plan creates.
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Make runners abort on their first failed sample.
    pub fn abort_on_first_failure(mut self, abort: bool) -> Self {
        self.abort_on_first_failure = abort;
        self
    }

    /// Token observed by every settle and scenario replay.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Engine factory.
    pub fn factory(&self) -> &'a F {
        self.factory
    }

    /// Clock.
    pub fn time(&self) -> &T {
        &self.time
    }

    /// Dataset seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Configured settle bound.
    pub fn settle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Engine options, with `bins` overridden when given.
    pub fn config_with_bins(&self, bins: Option<u16>) -> EngineConfig {
        let mut config = self.engine_config.clone();
        if bins.is_some() {
            config.bins = bins;
        }
        config
    }

    /// Cancellation token for settles and replays.
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Swap in `token`, returning the one it replaces.
    pub(crate) fn replace_cancel(&mut self, token: CancellationToken) -> CancellationToken {
        std::mem::replace(&mut self.cancel, token)
    }

    /// A fresh runner honouring the failure policy.
    pub fn runner(&self) -> BenchmarkRunner<T> {
        BenchmarkRunner::new(self.time.clone()).abort_on_first_failure(self.abort_on_first_failure)
    }

    /// A barrier bounded by the configured timeout and the cancellation token.
    pub fn barrier(&self) -> QuiescenceBarrier<T> {
        QuiescenceBarrier::new(self.time.clone(), self.idle_timeout)
            .cancel_token(self.cancel.clone())
    }

    /// Generate a dataset from the context seed.
    ///
    /// Each call starts from the seed again, so every plan sees the same
    /// values for the same shape regardless of the order plans run in.
    pub fn dataset(&self, spec: &DatasetSpec) -> BenchResult<Dataset> {
        DatasetGenerator::new(SeededRandomProvider::new(self.seed)).generate(spec)
    }
}
