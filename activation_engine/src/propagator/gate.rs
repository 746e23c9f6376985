//! Gating - scaling a propagator's output by a controlling upstream.

use construct_model::{ActivationPacket, ConstructSymbol, Packet};
use serde::{Deserialize, Serialize};

use super::{PendingPolicy, Propagator};
use crate::connector::{InputBundle, Pulled};
use crate::error::PropagatorError;
use crate::selector::Checkpoint;

/// How the gate's strength becomes a weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateTransform {
    /// The weight is the gate strength.
    #[default]
    Identity,
    /// The weight is `1 - strength`: an active gate closes.
    Inverted,
}

impl GateTransform {
    pub fn weight(self, strength: f64) -> f64 {
        match self {
            GateTransform::Identity => strength,
            GateTransform::Inverted => 1.0 - strength,
        }
    }
}

/// Wraps a propagator and scales its activation output by a gate.
///
/// The gate is one upstream; its strength for the gated construct is the
/// weight. The wrapped propagator sees every other input. Entries that end
/// up at or below zero are dropped. A gate that mentions nothing, or is
/// pending under [`PendingPolicy::Ignore`], has strength `0.0`.
#[derive(Debug, Clone)]
pub struct GatedPropagator<P> {
    base: P,
    gate: ConstructSymbol,
    transform: GateTransform,
    pending: PendingPolicy,
}

impl<P: Propagator> GatedPropagator<P> {
    pub fn new(base: P, gate: ConstructSymbol) -> Self {
        Self {
            base,
            gate,
            transform: GateTransform::default(),
            pending: PendingPolicy::default(),
        }
    }

    pub fn with_transform(mut self, transform: GateTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_pending(mut self, pending: PendingPolicy) -> Self {
        self.pending = pending;
        self
    }

    pub fn gate(&self) -> &ConstructSymbol {
        &self.gate
    }

    pub fn base(&self) -> &P {
        &self.base
    }

    fn gate_strength(
        &self,
        construct: &ConstructSymbol,
        inputs: &InputBundle,
    ) -> Result<f64, PropagatorError> {
        match inputs.get(&self.gate) {
            Some(Pulled::Ready(packet)) => {
                let activation =
                    packet
                        .as_activation()
                        .ok_or_else(|| PropagatorError::UnexpectedPacket {
                            upstream: self.gate.clone(),
                            expected: "activation",
                            found: packet.type_name(),
                        })?;
                Ok(activation.strength(construct))
            }
            Some(Pulled::Pending) if self.pending == PendingPolicy::Reject => {
                Err(PropagatorError::PendingInput(self.gate.clone()))
            }
            Some(Pulled::Pending) | None => Ok(0.0),
        }
    }
}

impl<P: Propagator> Propagator for GatedPropagator<P> {
    fn propagate(
        &mut self,
        construct: &ConstructSymbol,
        inputs: &InputBundle,
    ) -> Result<Packet, PropagatorError> {
        let weight = self.transform.weight(self.gate_strength(construct, inputs)?);

        let ungated: InputBundle = inputs
            .iter()
            .filter(|(upstream, _)| **upstream != self.gate)
            .map(|(upstream, pulled)| (upstream.clone(), pulled.clone()))
            .collect();
        let output = self.base.propagate(construct, &ungated)?;

        let activation = output
            .as_activation()
            .ok_or_else(|| PropagatorError::UnexpectedPacket {
                upstream: construct.clone(),
                expected: "activation",
                found: output.type_name(),
            })?;

        Ok(activation
            .scaled(weight)
            .iter()
            .filter(|(_, strength)| *strength > 0.0)
            .map(|(symbol, strength)| (symbol.clone(), strength))
            .collect::<ActivationPacket>()
            .into())
    }

    fn reset(&mut self) {
        self.base.reset();
    }

    fn checkpoint(&self) -> Option<Checkpoint> {
        self.base.checkpoint()
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        self.base.rewind(checkpoint);
    }
}
