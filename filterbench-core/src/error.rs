//! Error types shared across the harness.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the harness and by engines driven through it.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Generator or harness parameters are invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A scenario produced a protocol message with an unrecognised tag.
    #[error("unknown command tag: {0}")]
    UnknownCommand(String),

    /// A command arrived with a sequence number below the last applied one.
    #[error("command out of order: seq {got} after {previous}")]
    OutOfOrder {
        /// Sequence number of the last accepted command.
        previous: u64,
        /// Sequence number that was rejected.
        got: u64,
    },

    /// The engine did not become idle within the configured bound.
    #[error("engine did not settle within {0:?}")]
    IdleTimeout(Duration),

    /// The operation was abandoned because its cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// An operation was attempted on a disposed engine handle.
    #[error("engine handle is closed")]
    HandleClosed,

    /// The requested dimension does not exist in the ingested dataset.
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    /// The engine worker went away without being disposed.
    #[error("engine worker exited unexpectedly")]
    EngineGone,

    /// A suite step reported failure.
    #[error("step '{step}' failed: {reason}")]
    StepFailed {
        /// Label of the failing step.
        step: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A suite step exceeded its time bound.
    #[error("step '{step}' timed out after {after:?}")]
    StepTimeout {
        /// Label of the step that timed out.
        step: String,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// A report file could not be classified as any known shape.
    #[error("invalid report: {0}")]
    InvalidReport(String),

    /// Filesystem failure while reading or writing reports.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Whether work issued before this error may still be running on the engine.
    ///
    /// After such an error nothing further may be issued to the same engine
    /// except `dispose`.
    pub fn leaves_engine_busy(&self) -> bool {
        matches!(self, BenchError::IdleTimeout(_) | BenchError::Cancelled)
    }
}

/// Result type used throughout the harness.
pub type BenchResult<T> = Result<T, BenchError>;
