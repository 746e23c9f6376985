//! Propagators - the computation a realizer performs on its pulled inputs.
//!
//! A propagator only sees the [`InputBundle`] handed to it. It never reads
//! container state, and given the same bundle it produces the same packet.
//! Selectors are the one exception: they own an explicit random source,
//! which [`Propagator::reset`] restores.

mod effector;
mod flow;
mod gate;
mod node;

pub use effector::*;
pub use flow::*;
pub use gate::*;
pub use node::*;

use construct_model::{ActivationPacket, ConstructSymbol, Packet};
use serde::{Deserialize, Serialize};

use crate::connector::{InputBundle, Pulled};
use crate::error::PropagatorError;
use crate::selector::Checkpoint;

/// The computation behind a construct realizer.
pub trait Propagator {
    /// Compute the output of `construct` from its pulled inputs.
    fn propagate(
        &mut self,
        construct: &ConstructSymbol,
        inputs: &InputBundle,
    ) -> Result<Packet, PropagatorError>;

    /// Restore construction-time state.
    fn reset(&mut self) {}

    /// Capture state that `propagate` advances. Stateless propagators return
    /// `None`.
    fn checkpoint(&self) -> Option<Checkpoint> {
        None
    }

    /// Rewind to a checkpoint taken by this propagator.
    fn rewind(&mut self, _checkpoint: Checkpoint) {}
}

/// How strengths for the same symbol from several upstreams are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    #[default]
    Max,
    Sum,
}

impl CombinationRule {
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            CombinationRule::Max => a.max(b),
            CombinationRule::Sum => a + b,
        }
    }

    /// Fold a sequence of strengths, in order. `None` if it is empty.
    pub fn fold(self, strengths: impl IntoIterator<Item = f64>) -> Option<f64> {
        strengths
            .into_iter()
            .fold(None, |acc, strength| match acc {
                Some(current) => Some(self.combine(current, strength)),
                None => Some(strength),
            })
    }
}

/// What a propagator does with an upstream that has not produced output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPolicy {
    /// Pending inputs contribute nothing.
    #[default]
    Ignore,
    /// Pending inputs fail the propagation. This includes lagged links on
    /// the first pass.
    Reject,
}

/// Collect the activation packets of a bundle, in symbol order.
///
/// Non-activation packets are an error.
pub fn gather(
    inputs: &InputBundle,
    pending: PendingPolicy,
) -> Result<Vec<(&ConstructSymbol, &ActivationPacket)>, PropagatorError> {
    let mut packets = Vec::with_capacity(inputs.len());

    for (upstream, pulled) in inputs {
        match pulled {
            Pulled::Ready(packet) => match packet.as_activation() {
                Some(activation) => packets.push((upstream, activation)),
                None => {
                    return Err(PropagatorError::UnexpectedPacket {
                        upstream: upstream.clone(),
                        expected: "activation",
                        found: packet.type_name(),
                    })
                }
            },
            Pulled::Pending => {
                if pending == PendingPolicy::Reject {
                    return Err(PropagatorError::PendingInput(upstream.clone()));
                }
            }
        }
    }

    Ok(packets)
}

/// Merge every activation packet of a bundle into one.
pub fn combine_inputs(
    inputs: &InputBundle,
    rule: CombinationRule,
    pending: PendingPolicy,
) -> Result<ActivationPacket, PropagatorError> {
    let packets = gather(inputs, pending)?;

    Ok(packets
        .into_iter()
        .fold(ActivationPacket::new(), |acc, (_, packet)| {
            acc.merged(packet, |a, b| rule.combine(a, b))
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use construct_model::DecisionPacket;
    use std::rc::Rc;

    fn ready(packet: impl Into<Packet>) -> Pulled {
        Pulled::Ready(Rc::new(packet.into()))
    }

    #[test]
    fn test_combination_rules() {
        assert_eq!(CombinationRule::Max.fold([0.2, 0.7, 0.5]), Some(0.7));
        assert!((CombinationRule::Sum.fold([0.2, 0.7, 0.5]).unwrap() - 1.4).abs() < 1e-12);
        assert_eq!(CombinationRule::Max.fold([]), None);
    }

    #[test]
    fn test_combine_inputs_merges_packets() {
        let a = ConstructSymbol::chunk("A");
        let b = ConstructSymbol::chunk("B");
        let mut inputs = InputBundle::new();
        inputs.insert(
            ConstructSymbol::buffer("one"),
            ready(ActivationPacket::new().with(a.clone(), 0.4).with(b.clone(), 1.0)),
        );
        inputs.insert(
            ConstructSymbol::buffer("two"),
            ready(ActivationPacket::new().with(a.clone(), 0.6)),
        );
        inputs.insert(ConstructSymbol::buffer("three"), Pulled::Pending);

        let max = combine_inputs(&inputs, CombinationRule::Max, PendingPolicy::Ignore).unwrap();
        assert_eq!(max.strength(&a), 0.6);
        assert_eq!(max.strength(&b), 1.0);

        let sum = combine_inputs(&inputs, CombinationRule::Sum, PendingPolicy::Ignore).unwrap();
        assert!((sum.strength(&a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reject_policy_fails_on_pending() {
        let mut inputs = InputBundle::new();
        inputs.insert(ConstructSymbol::buffer("one"), Pulled::Pending);

        let result = gather(&inputs, PendingPolicy::Reject);
        assert_eq!(
            result.unwrap_err(),
            PropagatorError::PendingInput(ConstructSymbol::buffer("one"))
        );
    }

    #[test]
    fn test_decision_input_is_unexpected() {
        let mut inputs = InputBundle::new();
        inputs.insert(
            ConstructSymbol::response("main"),
            ready(DecisionPacket::default()),
        );

        assert!(matches!(
            gather(&inputs, PendingPolicy::Ignore),
            Err(PropagatorError::UnexpectedPacket { found: "decision", .. })
        ));
    }
}
