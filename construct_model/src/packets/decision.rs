//! Decision packets - the output of a selection step.

use serde::{Deserialize, Serialize};

use super::ActivationPacket;
use crate::symbols::ConstructSymbol;

/// The discrete outcome of a selector, together with what produced it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecisionPacket {
    /// Selected options, in the order they were drawn.
    chosen: Vec<ConstructSymbol>,

    /// Strengths the selector was given.
    strengths: ActivationPacket,

    /// Selection probabilities derived from the strengths.
    distribution: ActivationPacket,
}

impl DecisionPacket {
    /// Create a new decision packet.
    pub fn new(
        chosen: Vec<ConstructSymbol>,
        strengths: ActivationPacket,
        distribution: ActivationPacket,
    ) -> Self {
        Self {
            chosen,
            strengths,
            distribution,
        }
    }

    pub fn chosen(&self) -> &[ConstructSymbol] {
        &self.chosen
    }

    /// The first option drawn, if any.
    pub fn first_choice(&self) -> Option<&ConstructSymbol> {
        self.chosen.first()
    }

    pub fn is_chosen(&self, symbol: &ConstructSymbol) -> bool {
        self.chosen.contains(symbol)
    }

    pub fn strengths(&self) -> &ActivationPacket {
        &self.strengths
    }

    pub fn distribution(&self) -> &ActivationPacket {
        &self.distribution
    }

    /// Selection probability of `symbol` (0.0 if it was not an option).
    pub fn probability(&self, symbol: &ConstructSymbol) -> f64 {
        self.distribution.strength(symbol)
    }
}
