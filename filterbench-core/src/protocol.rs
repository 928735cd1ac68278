//! Protocol messages exchanged between a driver and an engine worker.
//!
//! Messages are JSON objects tagged by a `t` field:
//!
//! ```text
//! { "t": "FILTER_SET",   "dimId": "dim0", "lo": 10, "hi": 14, "seq": 3 }
//! { "t": "FILTER_CLEAR", "dimId": "dim0", "strategy": "delta", "seq": 4 }
//! ```
//!
//! Decoding inspects the tag before anything else; a tag the driver does not
//! know is rejected with [`BenchError::UnknownCommand`] rather than skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BenchError, BenchResult};

/// How a dimension's filter is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearStrategy {
    /// Revert the current narrowing incrementally, touching only excluded rows.
    Delta,
    /// Drop the dimension's state and rebuild it for every row.
    Recompute,
}

impl ClearStrategy {
    /// Short lowercase label, as used on the wire.
    pub fn label(self) -> &'static str {
        match self {
            ClearStrategy::Delta => "delta",
            ClearStrategy::Recompute => "recompute",
        }
    }
}

/// A protocol command.
///
/// `seq` orders commands within one scenario run independently of delivery
/// order; see [`SeqGuard`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Command {
    /// Restrict `dim_id` to the half-open range `[lo, hi)`.
    #[serde(rename = "FILTER_SET", rename_all = "camelCase")]
    FilterSet {
        /// Target dimension name.
        dim_id: String,
        /// Inclusive lower bound.
        lo: f64,
        /// Exclusive upper bound.
        hi: f64,
        /// Sequence number within the run.
        seq: u64,
    },
    /// Remove the filter on `dim_id`.
    #[serde(rename = "FILTER_CLEAR", rename_all = "camelCase")]
    FilterClear {
        /// Target dimension name.
        dim_id: String,
        /// Clearing strategy the engine should use.
        strategy: ClearStrategy,
        /// Sequence number within the run.
        seq: u64,
    },
}

impl Command {
    /// Every tag this driver understands.
    pub const TAGS: &'static [&'static str] = &["FILTER_SET", "FILTER_CLEAR"];

    /// Build a `FILTER_SET` command.
    pub fn filter_set(dim_id: impl Into<String>, lo: f64, hi: f64, seq: u64) -> Self {
        Command::FilterSet {
            dim_id: dim_id.into(),
            lo,
            hi,
            seq,
        }
    }

    /// Build a `FILTER_CLEAR` command.
    pub fn filter_clear(dim_id: impl Into<String>, strategy: ClearStrategy, seq: u64) -> Self {
        Command::FilterClear {
            dim_id: dim_id.into(),
            strategy,
            seq,
        }
    }

    /// The wire tag of this command.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::FilterSet { .. } => "FILTER_SET",
            Command::FilterClear { .. } => "FILTER_CLEAR",
        }
    }

    /// Sequence number of this command.
    pub fn seq(&self) -> u64 {
        match self {
            Command::FilterSet { seq, .. } | Command::FilterClear { seq, .. } => *seq,
        }
    }

    /// Dimension this command targets.
    pub fn dim_id(&self) -> &str {
        match self {
            Command::FilterSet { dim_id, .. } | Command::FilterClear { dim_id, .. } => dim_id,
        }
    }

    /// Return the same command renumbered to `seq`.
    pub fn with_seq(mut self, new_seq: u64) -> Self {
        match &mut self {
            Command::FilterSet { seq, .. } | Command::FilterClear { seq, .. } => *seq = new_seq,
        }
        self
    }

    /// Encode to JSON bytes.
    pub fn encode(&self) -> BenchResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON bytes.
    pub fn decode(bytes: &[u8]) -> BenchResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Decode from an already-parsed JSON value.
    ///
    /// The tag is checked first so unknown commands surface as
    /// [`BenchError::UnknownCommand`] instead of a generic JSON error.
    pub fn from_value(value: Value) -> BenchResult<Self> {
        let tag = match value.get("t") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => return Err(BenchError::UnknownCommand(other.to_string())),
            None => return Err(BenchError::UnknownCommand("<missing>".to_string())),
        };
        if !Self::TAGS.contains(&tag.as_str()) {
            return Err(BenchError::UnknownCommand(tag));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Enforces non-decreasing `seq` across one scenario run.
#[derive(Debug, Clone, Default)]
pub struct SeqGuard {
    last: Option<u64>,
}

impl SeqGuard {
    /// Create a guard that has not seen any command yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `command` if its sequence number does not go backwards.
    pub fn admit(&mut self, command: &Command) -> BenchResult<()> {
        let seq = command.seq();
        if let Some(previous) = self.last
            && seq < previous
        {
            return Err(BenchError::OutOfOrder { previous, got: seq });
        }
        self.last = Some(seq);
        Ok(())
    }

    /// Sequence number of the last admitted command.
    pub fn last(&self) -> Option<u64> {
        self.last
    }
}
