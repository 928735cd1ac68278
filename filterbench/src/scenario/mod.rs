//! Scenario scripting.
//!
//! A scenario is a named, lazy sequence of protocol commands. Every call to
//! [`Scenario::script`] starts a fresh sequence from the same deterministic
//! rule, and the consumer pulls element `i + 1` only after element `i` has
//! been applied and the engine has settled (see [`ScenarioDriver`]).
//!
//! # Usage
//!
//! ```rust
//! use filterbench::scenario::{BrushSweep, Scenario};
//!
//! let commands: Vec<_> = BrushSweep::default().script().collect();
//! assert_eq!(commands.len(), 64);
//! ```

mod driver;
mod registry;

use filterbench_core::{
    BenchError, BenchResult, Command, RandomProvider, SeededRandomProvider, dimension_name,
};
use serde_json::Value;

pub use driver::{Budget, ReplayStats, ScenarioDriver, StopReason};
pub use registry::{Composition, ComposedScenario, ScenarioRegistry};

/// Lazy command sequence produced by a scenario.
pub type Script = Box<dyn Iterator<Item = BenchResult<Command>>>;

/// A named command sequence generator.
pub trait Scenario {
    /// Scenario name for logs and registry lookup.
    fn name(&self) -> &str;

    /// Start a fresh command sequence.
    fn script(&self) -> Script;
}

/// Sliding window swept across one dimension.
///
/// Step `s` restricts the dimension to `[s, s + width)` with `seq = s`.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushSweep {
    dim_id: String,
    steps: u64,
    width: f64,
}

impl Default for BrushSweep {
    fn default() -> Self {
        Self {
            dim_id: dimension_name(0),
            steps: 64,
            width: 4.0,
        }
    }
}

impl BrushSweep {
    /// Sweep `dim_id` with the default 64 steps of width 4.
    pub fn new(dim_id: impl Into<String>) -> Self {
        Self {
            dim_id: dim_id.into(),
            ..Self::default()
        }
    }

    /// Override the number of steps.
    pub fn steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Override the window width.
    pub fn width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }
}

impl Scenario for BrushSweep {
    fn name(&self) -> &str {
        "brush-sweep"
    }

    fn script(&self) -> Script {
        let dim_id = self.dim_id.clone();
        let width = self.width;
        Box::new((0..self.steps).map(move |s| {
            let lo = s as f64;
            Ok(Command::filter_set(dim_id.clone(), lo, lo + width, s))
        }))
    }
}

/// Unbounded random brushing, round-robin across dimensions.
///
/// The stream is a pure function of the seed; drive it with a
/// [`Budget`] to bound it.
#[derive(Debug, Clone)]
pub struct RandomBrush {
    seed: u64,
    dimensions: Vec<String>,
    min: f64,
    max: f64,
    width: f64,
}

impl RandomBrush {
    /// Brush `dimensions` over `[min, max)` with windows a tenth of the range wide.
    pub fn new(seed: u64, dimensions: Vec<String>, min: f64, max: f64) -> BenchResult<Self> {
        if !(min.is_finite() && max.is_finite()) || max <= min {
            return Err(BenchError::InvalidConfig(format!(
                "brush range must satisfy min < max, got [{min}, {max})"
            )));
        }
        if dimensions.is_empty() {
            return Err(BenchError::InvalidConfig(
                "random brush needs at least one dimension".to_string(),
            ));
        }
        Ok(Self {
            seed,
            dimensions,
            min,
            max,
            width: (max - min) / 10.0,
        })
    }
}

impl Scenario for RandomBrush {
    fn name(&self) -> &str {
        "random-brush"
    }

    fn script(&self) -> Script {
        let random = SeededRandomProvider::new(self.seed);
        let dimensions = self.dimensions.clone();
        let (min, upper, width) = (self.min, self.max - self.width, self.width);
        let mut seq = 0u64;
        Box::new(std::iter::from_fn(move || {
            let dim = &dimensions[seq as usize % dimensions.len()];
            let lo = random.random_range(min..upper);
            let command = Command::filter_set(dim.clone(), lo, lo + width, seq);
            seq += 1;
            Some(Ok(command))
        }))
    }
}

/// Scenario replayed from recorded protocol messages.
///
/// Messages are decoded one at a time as the script is consumed, so an
/// unknown tag aborts the replay at that element.
#[derive(Debug, Clone)]
pub struct JsonScenario {
    name: String,
    messages: Vec<Value>,
}

impl JsonScenario {
    /// Wrap already-parsed messages.
    pub fn new(name: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            messages,
        }
    }

    /// Parse a JSON array of protocol messages.
    pub fn from_json(name: impl Into<String>, json: &str) -> BenchResult<Self> {
        let messages: Vec<Value> = serde_json::from_str(json)?;
        Ok(Self::new(name, messages))
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no messages were recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Scenario for JsonScenario {
    fn name(&self) -> &str {
        &self.name
    }

    fn script(&self) -> Script {
        Box::new(self.messages.clone().into_iter().map(Command::from_value))
    }
}
