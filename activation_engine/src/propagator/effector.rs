//! Actuators and effectors - the decision end of a response cycle.

use construct_model::{ActivationPacket, ConstructSymbol, Packet};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::{combine_inputs, CombinationRule, PendingPolicy, Propagator};
use crate::connector::{InputBundle, Pulled};
use crate::error::PropagatorError;
use crate::selector::{Checkpoint, Selector};

/// Response unit: merges its inputs and lets a selector choose among them.
///
/// With an option set, only those options are offered, and options no
/// upstream mentions are offered with strength `0.0`. Without one, every
/// symbol in the merged input is an option.
pub struct ActuatorPropagator {
    options: Option<BTreeSet<ConstructSymbol>>,
    combination: CombinationRule,
    pending: PendingPolicy,
    selector: Box<dyn Selector>,
}

impl ActuatorPropagator {
    pub fn new(selector: impl Selector + 'static) -> Self {
        Self {
            options: None,
            combination: CombinationRule::default(),
            pending: PendingPolicy::default(),
            selector: Box::new(selector),
        }
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = ConstructSymbol>) -> Self {
        self.options = Some(options.into_iter().collect());
        self
    }

    pub fn with_combination(mut self, combination: CombinationRule) -> Self {
        self.combination = combination;
        self
    }

    pub fn with_pending(mut self, pending: PendingPolicy) -> Self {
        self.pending = pending;
        self
    }

    pub fn options(&self) -> Option<&BTreeSet<ConstructSymbol>> {
        self.options.as_ref()
    }
}

impl Propagator for ActuatorPropagator {
    fn propagate(
        &mut self,
        _construct: &ConstructSymbol,
        inputs: &InputBundle,
    ) -> Result<Packet, PropagatorError> {
        let merged = combine_inputs(inputs, self.combination, self.pending)?;
        let candidates = match &self.options {
            Some(options) => merged.subpacket(options),
            None => merged,
        };

        Ok(self.selector.select(&candidates)?.into())
    }

    fn reset(&mut self) {
        self.selector.reset();
    }

    fn checkpoint(&self) -> Option<Checkpoint> {
        self.selector.checkpoint()
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        self.selector.rewind(checkpoint);
    }
}

impl fmt::Debug for ActuatorPropagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActuatorPropagator")
            .field("options", &self.options)
            .field("combination", &self.combination)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// Behavior unit: maps chosen options to commands.
///
/// For every upstream decision, each chosen option with a mapped command
/// yields `{command: 1.0}`. Unmapped choices are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectorPropagator {
    commands: BTreeMap<ConstructSymbol, ConstructSymbol>,
    pending: PendingPolicy,
}

impl EffectorPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `command` whenever `option` is chosen.
    pub fn with_command(mut self, option: ConstructSymbol, command: ConstructSymbol) -> Self {
        self.commands.insert(option, command);
        self
    }

    pub fn with_pending(mut self, pending: PendingPolicy) -> Self {
        self.pending = pending;
        self
    }

    pub fn command(&self, option: &ConstructSymbol) -> Option<&ConstructSymbol> {
        self.commands.get(option)
    }
}

impl Propagator for EffectorPropagator {
    fn propagate(
        &mut self,
        _construct: &ConstructSymbol,
        inputs: &InputBundle,
    ) -> Result<Packet, PropagatorError> {
        let mut output = ActivationPacket::new();

        for (upstream, pulled) in inputs {
            let packet = match pulled {
                Pulled::Ready(packet) => packet,
                Pulled::Pending if self.pending == PendingPolicy::Reject => {
                    return Err(PropagatorError::PendingInput(upstream.clone()))
                }
                Pulled::Pending => continue,
            };
            let decision = packet.as_decision().ok_or_else(|| PropagatorError::UnexpectedPacket {
                upstream: upstream.clone(),
                expected: "decision",
                found: packet.type_name(),
            })?;

            for option in decision.chosen() {
                if let Some(command) = self.commands.get(option) {
                    output = output.with(command.clone(), 1.0);
                }
            }
        }

        Ok(output.into())
    }
}
