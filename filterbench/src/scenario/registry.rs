//! Scenario registry and composition.

use std::collections::VecDeque;
use std::rc::Rc;

use filterbench_core::{BenchError, BenchResult, Command};

use super::{Scenario, Script};

/// How a composed scenario merges its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    /// Each part runs to exhaustion before the next starts.
    Concat,
    /// Parts take turns, one command each, until all are exhausted.
    RoundRobin,
}

/// A scenario built from other scenarios.
///
/// Composed scripts are renumbered so `seq` counts up from zero across the
/// whole sequence, whatever the parts emitted.
#[derive(Clone)]
pub struct ComposedScenario {
    name: String,
    composition: Composition,
    parts: Vec<Rc<dyn Scenario>>,
}

impl ComposedScenario {
    /// Compose `parts` under `name`.
    pub fn new(
        name: impl Into<String>,
        composition: Composition,
        parts: Vec<Rc<dyn Scenario>>,
    ) -> Self {
        Self {
            name: name.into(),
            composition,
            parts,
        }
    }

    /// Composition mode.
    pub fn composition(&self) -> Composition {
        self.composition
    }
}

impl Scenario for ComposedScenario {
    fn name(&self) -> &str {
        &self.name
    }

    fn script(&self) -> Script {
        let merged: Script = match self.composition {
            Composition::Concat => Box::new(
                self.parts
                    .iter()
                    .map(|p| p.script())
                    .collect::<Vec<_>>()
                    .into_iter()
                    .flatten(),
            ),
            Composition::RoundRobin => {
                let mut queue: VecDeque<Script> = self.parts.iter().map(|p| p.script()).collect();
                Box::new(std::iter::from_fn(move || {
                    while let Some(mut script) = queue.pop_front() {
                        if let Some(next) = script.next() {
                            queue.push_back(script);
                            return Some(next);
                        }
                    }
                    None
                }))
            }
        };
        let mut seq = 0u64;
        Box::new(merged.map(move |command: BenchResult<Command>| -> BenchResult<Command> {
            let command = command?.with_seq(seq);
            seq += 1;
            Ok(command)
        }))
    }
}

/// Named scenarios available to the suite.
#[derive(Default)]
pub struct ScenarioRegistry {
    scenarios: Vec<Rc<dyn Scenario>>,
}

impl ScenarioRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scenario. A later registration with the same name replaces
    /// the earlier one.
    pub fn register(&mut self, scenario: impl Scenario + 'static) -> &mut Self {
        let scenario: Rc<dyn Scenario> = Rc::new(scenario);
        self.scenarios.retain(|s| s.name() != scenario.name());
        self.scenarios.push(scenario);
        self
    }

    /// Look a scenario up by name.
    pub fn get(&self, name: &str) -> Option<Rc<dyn Scenario>> {
        self.scenarios.iter().find(|s| s.name() == name).cloned()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name()).collect()
    }

    /// Concatenate the named scenarios.
    pub fn concat(&self, name: &str, parts: &[&str]) -> BenchResult<ComposedScenario> {
        self.compose(name, Composition::Concat, parts)
    }

    /// Interleave the named scenarios one command at a time.
    pub fn round_robin(&self, name: &str, parts: &[&str]) -> BenchResult<ComposedScenario> {
        self.compose(name, Composition::RoundRobin, parts)
    }

    fn compose(
        &self,
        name: &str,
        composition: Composition,
        parts: &[&str],
    ) -> BenchResult<ComposedScenario> {
        let parts = parts
            .iter()
            .map(|part| {
                self.get(part).ok_or_else(|| {
                    BenchError::InvalidConfig(format!("no scenario named '{part}'"))
                })
            })
            .collect::<BenchResult<Vec<_>>>()?;
        Ok(ComposedScenario::new(name, composition, parts))
    }
}
