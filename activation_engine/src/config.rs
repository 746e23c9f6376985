//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EngineError, SelectorError};
use crate::propagator::{CombinationRule, PendingPolicy};
use crate::selector::BoltzmannSelector;

/// Parameters shared by the realizer builders.
///
/// ```toml
/// combination = "sum"
/// pending = "reject"
/// temperature = 0.1
/// threshold = 0.25
/// picks = 1
/// seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How nodes, flows and actuators merge upstream strengths.
    pub combination: CombinationRule,

    /// What propagators do with upstreams that have not produced output.
    pub pending: PendingPolicy,

    /// Boltzmann temperature of actuator selectors.
    pub temperature: f64,

    /// Actuator options at or below this strength are never chosen.
    pub threshold: Option<f64>,

    /// Options drawn per decision.
    pub picks: usize,

    /// Seed for actuator selectors. Unseeded selectors draw from the OS.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            combination: CombinationRule::Max,
            pending: PendingPolicy::Ignore,
            temperature: 1.0,
            threshold: None,
            picks: 1,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, EngineError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// A selector with this configuration's temperature, threshold, picks
    /// and seed.
    pub fn selector(&self) -> Result<BoltzmannSelector, SelectorError> {
        let mut selector = BoltzmannSelector::new(self.temperature)?.with_picks(self.picks);
        if let Some(threshold) = self.threshold {
            selector = selector.with_threshold(threshold)?;
        }
        Ok(match self.seed {
            Some(seed) => selector.with_seed(seed),
            None => selector,
        })
    }
}
