//! Quiescence detection.
//!
//! Engines do their work off the calling task, so a caller that stops a timer
//! right after issuing a command measures nothing useful. Two pieces cover
//! this:
//!
//! - [`IdleTracker`] / [`IdleBarrier`]: the signalling pair a worker-based
//!   engine uses to publish "nothing in flight, nothing reclaiming".
//! - [`QuiescenceBarrier`]: the harness-side bound around any engine's
//!   `when_idle()`, turning a hang into [`BenchError::IdleTimeout`] and an
//!   abandoned step into [`BenchError::Cancelled`].
//!
//! The in-flight count is raised by the issuing side *before* a request is
//! sent, and the worker lowers it and raises `reclaim_pending` in one update,
//! so there is no window in which a waiter can see a false idle.

use std::sync::Arc;
use std::time::Duration;

use filterbench_core::{BenchError, BenchResult, TimeError, TimeProvider};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;

/// Snapshot of an engine's outstanding work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdleState {
    /// Mutating requests issued but not yet applied.
    pub in_flight: u64,
    /// A background reclamation cycle is scheduled or running.
    pub reclaim_pending: bool,
    /// The worker has exited.
    pub closed: bool,
}

impl IdleState {
    /// No in-flight requests and no pending reclamation.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && !self.reclaim_pending
    }
}

/// Publishing side of the idle signal.
///
/// Cheap to clone; the issuing facade and the worker each hold one.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    tx: Arc<watch::Sender<IdleState>>,
}

impl IdleTracker {
    /// Create a tracker in the idle state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(IdleState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Create a barrier observing this tracker.
    pub fn barrier(&self) -> IdleBarrier {
        IdleBarrier {
            rx: self.tx.subscribe(),
        }
    }

    /// Record that a mutating request has been issued.
    pub fn begin(&self) {
        self.tx.send_modify(|s| s.in_flight += 1);
    }

    /// Record that a request has been applied, optionally scheduling reclamation.
    pub fn complete(&self, reclaim: bool) {
        self.tx.send_modify(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            s.reclaim_pending |= reclaim;
        });
    }

    /// Record that the scheduled reclamation cycle has settled.
    pub fn reclaim_done(&self) {
        self.tx.send_modify(|s| s.reclaim_pending = false);
    }

    /// Record that the worker is gone.
    pub fn close(&self) {
        self.tx.send_modify(|s| s.closed = true);
    }

    /// Current state.
    pub fn state(&self) -> IdleState {
        *self.tx.borrow()
    }
}

impl Default for IdleTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Waiting side of the idle signal.
#[derive(Debug, Clone)]
pub struct IdleBarrier {
    rx: watch::Receiver<IdleState>,
}

impl IdleBarrier {
    /// Resolve once the tracker reports idle.
    ///
    /// Fails with [`BenchError::EngineGone`] if the worker exits with work
    /// still outstanding. Unbounded; wrap in [`QuiescenceBarrier`] for a limit.
    pub async fn wait(&self) -> BenchResult<()> {
        let mut rx = self.rx.clone();
        let state = *rx
            .wait_for(|s| s.is_idle() || s.closed)
            .await
            .map_err(|_| BenchError::EngineGone)?;
        if state.is_idle() {
            Ok(())
        } else {
            Err(BenchError::EngineGone)
        }
    }
}

/// Bounded wait for engine quiescence.
#[derive(Debug, Clone)]
pub struct QuiescenceBarrier<T: TimeProvider> {
    time: T,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<T: TimeProvider> QuiescenceBarrier<T> {
    /// Create a barrier that gives up after `timeout`.
    pub fn new(time: T, timeout: Duration) -> Self {
        Self {
            time,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Also give up as soon as `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The configured bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait until `engine` is idle, the bound elapses, or the token fires.
    pub async fn settle<E: Engine>(&self, engine: &E) -> BenchResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::warn!("Settle abandoned: cancelled");
                Err(BenchError::Cancelled)
            }
            outcome = self.time.timeout(self.timeout, engine.when_idle()) => match outcome {
                Ok(result) => result,
                Err(TimeError::Elapsed) | Err(TimeError::Shutdown) => {
                    tracing::warn!("Engine did not settle within {:?}", self.timeout);
                    Err(BenchError::IdleTimeout(self.timeout))
                }
            },
        }
    }
}
