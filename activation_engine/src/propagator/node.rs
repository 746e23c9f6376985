//! Node and buffer propagators.

use construct_model::{ActivationPacket, ConstructSymbol, Packet};

use super::{combine_inputs, gather, CombinationRule, PendingPolicy, Propagator};
use crate::connector::InputBundle;
use crate::error::PropagatorError;

/// Aggregates the strength of one node across all of its upstreams.
///
/// The output is `{node: combined}`, where upstreams that do not mention the
/// node are skipped and a node nobody mentions gets `0.0`. External input
/// arrives in the bundle under the node's own symbol and is combined like
/// any other upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodePropagator {
    pub combination: CombinationRule,
    pub pending: PendingPolicy,
}

impl NodePropagator {
    pub fn new(combination: CombinationRule, pending: PendingPolicy) -> Self {
        Self {
            combination,
            pending,
        }
    }
}

impl Propagator for NodePropagator {
    fn propagate(
        &mut self,
        construct: &ConstructSymbol,
        inputs: &InputBundle,
    ) -> Result<Packet, PropagatorError> {
        let packets = gather(inputs, self.pending)?;
        let strength = self
            .combination
            .fold(packets.iter().filter_map(|(_, packet)| packet.get(construct)))
            .unwrap_or(0.0);

        Ok(ActivationPacket::new()
            .with(construct.clone(), strength)
            .into())
    }
}

/// Holds activation supplied from outside the graph (stimuli, goals).
///
/// The output is every input packet merged, the external one included.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BufferPropagator {
    pub combination: CombinationRule,
    pub pending: PendingPolicy,
}

impl BufferPropagator {
    pub fn new(combination: CombinationRule, pending: PendingPolicy) -> Self {
        Self {
            combination,
            pending,
        }
    }
}

impl Propagator for BufferPropagator {
    fn propagate(
        &mut self,
        _construct: &ConstructSymbol,
        inputs: &InputBundle,
    ) -> Result<Packet, PropagatorError> {
        Ok(combine_inputs(inputs, self.combination, self.pending)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Pulled;
    use std::rc::Rc;

    fn ready(packet: ActivationPacket) -> Pulled {
        Pulled::Ready(Rc::new(packet.into()))
    }

    #[test]
    fn test_node_takes_max_of_own_strength() {
        let node = ConstructSymbol::chunk("APPLE");
        let mut inputs = InputBundle::new();
        inputs.insert(
            ConstructSymbol::buffer("stimulus"),
            ready(ActivationPacket::new().with(node.clone(), 0.3)),
        );
        inputs.insert(
            ConstructSymbol::flow_bu("bu"),
            ready(
                ActivationPacket::new()
                    .with(node.clone(), 0.8)
                    .with(ConstructSymbol::chunk("PEAR"), 1.0),
            ),
        );

        let mut propagator = NodePropagator::default();
        let output = propagator.propagate(&node, &inputs).unwrap();
        let activation = output.as_activation().unwrap();

        assert_eq!(activation.len(), 1);
        assert_eq!(activation.strength(&node), 0.8);
    }

    #[test]
    fn test_node_sum_rule() {
        let node = ConstructSymbol::chunk("APPLE");
        let mut inputs = InputBundle::new();
        inputs.insert(
            ConstructSymbol::buffer("a"),
            ready(ActivationPacket::new().with(node.clone(), 0.3)),
        );
        inputs.insert(
            ConstructSymbol::buffer("b"),
            ready(ActivationPacket::new().with(node.clone(), 0.5)),
        );

        let mut propagator = NodePropagator::new(CombinationRule::Sum, PendingPolicy::Ignore);
        let output = propagator.propagate(&node, &inputs).unwrap();

        assert!((output.as_activation().unwrap().strength(&node) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_unmentioned_node_is_zero() {
        let node = ConstructSymbol::feature("color", "red");
        let mut propagator = NodePropagator::default();

        let output = propagator.propagate(&node, &InputBundle::new()).unwrap();
        assert_eq!(output.as_activation().unwrap().get(&node), Some(0.0));
    }

    #[test]
    fn test_buffer_passes_external_input_through() {
        let buffer = ConstructSymbol::buffer("stimulus");
        let stimulus = ActivationPacket::new()
            .with(ConstructSymbol::chunk("APPLE"), 1.0)
            .with(ConstructSymbol::feature("color", "red"), 0.5);
        let mut inputs = InputBundle::new();
        inputs.insert(buffer.clone(), ready(stimulus.clone()));

        let mut propagator = BufferPropagator::default();
        let output = propagator.propagate(&buffer, &inputs).unwrap();

        assert_eq!(output.as_activation(), Some(&stimulus));
    }
}
