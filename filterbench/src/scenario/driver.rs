//! Scenario replay against an engine.

use std::fmt;
use std::time::Duration;

use filterbench_core::{BenchResult, SeqGuard, TimeProvider};
use tokio_util::sync::CancellationToken;

use super::Scenario;
use crate::barrier::QuiescenceBarrier;
use crate::engine::Engine;

/// Limits on one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
    /// Stop after this many commands.
    pub max_commands: Option<u64>,
    /// Stop once this much time has passed since the replay started.
    pub max_duration: Option<Duration>,
}

impl Budget {
    /// No limits; the script must end on its own.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Limit the number of commands.
    pub fn commands(max: u64) -> Self {
        Self {
            max_commands: Some(max),
            max_duration: None,
        }
    }

    /// Limit the replay duration.
    pub fn duration(max: Duration) -> Self {
        Self {
            max_commands: None,
            max_duration: Some(max),
        }
    }
}

/// Why a replay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The script ended.
    Exhausted,
    /// [`Budget::max_commands`] was reached.
    CommandBudget,
    /// [`Budget::max_duration`] was reached.
    TimeBudget,
    /// The cancellation token fired.
    Cancelled,
}

/// Outcome of a completed replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStats {
    /// Scenario name.
    pub scenario: String,
    /// Commands applied and settled.
    pub commands: u64,
    /// Sequence number of the last applied command.
    pub last_seq: Option<u64>,
    /// Time from the first pull to the last settle.
    pub elapsed: Duration,
    /// Why the replay stopped.
    pub stop: StopReason,
}

impl fmt::Display for ReplayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} commands in {:?} ({:?})",
            self.scenario, self.commands, self.elapsed, self.stop
        )
    }
}

/// Replays scenarios against one engine, one settled command at a time.
///
/// The driver is the single writer for its engine: it submits command `n`,
/// waits for quiescence, and only then pulls command `n + 1` from the script.
pub struct ScenarioDriver<'a, E: Engine, T: TimeProvider> {
    engine: &'a E,
    time: T,
    barrier: QuiescenceBarrier<T>,
    budget: Budget,
    cancel: CancellationToken,
}

impl<'a, E: Engine, T: TimeProvider> ScenarioDriver<'a, E, T> {
    /// Drive `engine`, giving each settle at most `idle_timeout`.
    pub fn new(engine: &'a E, time: T, idle_timeout: Duration) -> Self {
        Self {
            engine,
            barrier: QuiescenceBarrier::new(time.clone(), idle_timeout),
            time,
            budget: Budget::unlimited(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the replay budget.
    pub fn budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    /// Stop between commands once `token` is cancelled; a settle in progress
    /// is abandoned with [`BenchError::Cancelled`](filterbench_core::BenchError::Cancelled).
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.barrier = self.barrier.cancel_token(token.clone());
        self.cancel = token;
        self
    }

    /// Replay `scenario` until its script ends or a limit is hit.
    ///
    /// A malformed or out-of-order command aborts the replay with its error;
    /// commands already applied stay applied.
    pub async fn replay(&self, scenario: &dyn Scenario) -> BenchResult<ReplayStats> {
        let started = self.time.now();
        let mut guard = SeqGuard::new();
        let mut script = scenario.script();
        let mut commands = 0u64;

        let stop = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if self.budget.max_commands.is_some_and(|max| commands >= max) {
                break StopReason::CommandBudget;
            }
            if self
                .budget
                .max_duration
                .is_some_and(|max| self.time.now().saturating_sub(started) >= max)
            {
                break StopReason::TimeBudget;
            }

            let Some(next) = script.next() else {
                break StopReason::Exhausted;
            };
            let command = next?;
            guard.admit(&command)?;
            tracing::debug!("{} seq={} {:?}", scenario.name(), command.seq(), command);
            self.engine.submit(command)?;
            self.barrier.settle(self.engine).await?;
            commands += 1;
        };

        let stats = ReplayStats {
            scenario: scenario.name().to_string(),
            commands,
            last_seq: guard.last(),
            elapsed: self.time.now().saturating_sub(started),
            stop,
        };
        tracing::debug!("Replay finished: {}", stats);
        Ok(stats)
    }
}
