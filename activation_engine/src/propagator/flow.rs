//! Activation flows - fixed transformations of node activation.
//!
//! A [`FlowPropagator`] merges its inputs and hands the merged packet to a
//! [`Channel`]. Channels:
//! - [`AssociativeMapping`]: weighted links between nodes
//! - [`RuleTable`]: weighted condition sums firing conclusions
//! - [`TopDown`]: chunks activate their features
//! - [`BottomUp`]: features activate the chunks they define

use construct_model::{ActivationPacket, ConstructSymbol, Packet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{combine_inputs, CombinationRule, PendingPolicy, Propagator};
use crate::connector::InputBundle;
use crate::error::PropagatorError;

/// A fixed transformation of one activation packet.
pub trait Channel {
    fn apply(&self, input: &ActivationPacket) -> ActivationPacket;
}

/// Propagator of a flow construct.
#[derive(Debug, Clone, Default)]
pub struct FlowPropagator<C> {
    channel: C,
    combination: CombinationRule,
    pending: PendingPolicy,
}

impl<C: Channel> FlowPropagator<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            combination: CombinationRule::default(),
            pending: PendingPolicy::default(),
        }
    }

    pub fn with_combination(mut self, combination: CombinationRule) -> Self {
        self.combination = combination;
        self
    }

    pub fn with_pending(mut self, pending: PendingPolicy) -> Self {
        self.pending = pending;
        self
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C: Channel> Propagator for FlowPropagator<C> {
    fn propagate(
        &mut self,
        _construct: &ConstructSymbol,
        inputs: &InputBundle,
    ) -> Result<Packet, PropagatorError> {
        let merged = combine_inputs(inputs, self.combination, self.pending)?;
        Ok(self.channel.apply(&merged).into())
    }
}

/// Weighted links: `out[t] = sum over s of w(s, t) * in[s]`.
///
/// Every target with at least one weight appears in the output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociativeMapping {
    /// target -> (source -> weight)
    weights: BTreeMap<ConstructSymbol, BTreeMap<ConstructSymbol, f64>>,
}

impl AssociativeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the weight of the link `source -> target`.
    pub fn with_weight(mut self, source: ConstructSymbol, target: ConstructSymbol, weight: f64) -> Self {
        self.weights.entry(target).or_default().insert(source, weight);
        self
    }

    pub fn weight(&self, source: &ConstructSymbol, target: &ConstructSymbol) -> f64 {
        self.weights
            .get(target)
            .and_then(|sources| sources.get(source))
            .copied()
            .unwrap_or(0.0)
    }
}

impl Channel for AssociativeMapping {
    fn apply(&self, input: &ActivationPacket) -> ActivationPacket {
        self.weights
            .iter()
            .map(|(target, sources)| {
                let strength = sources
                    .iter()
                    .map(|(source, weight)| weight * input.strength(source))
                    .sum();
                (target.clone(), strength)
            })
            .collect()
    }
}

/// One rule: a weighted sum of conditions supporting a conclusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub conclusion: ConstructSymbol,
    pub conditions: Vec<(ConstructSymbol, f64)>,
}

impl Rule {
    pub fn new(conclusion: ConstructSymbol) -> Self {
        Self {
            conclusion,
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: ConstructSymbol, weight: f64) -> Self {
        self.conditions.push((condition, weight));
        self
    }

    /// Support for the conclusion given the input.
    pub fn strength(&self, input: &ActivationPacket) -> f64 {
        self.conditions
            .iter()
            .map(|(condition, weight)| weight * input.strength(condition))
            .sum()
    }
}

/// A table of rules. Rules sharing a conclusion combine by max.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Channel for RuleTable {
    fn apply(&self, input: &ActivationPacket) -> ActivationPacket {
        let mut conclusions: BTreeMap<ConstructSymbol, f64> = BTreeMap::new();

        for rule in &self.rules {
            let strength = rule.strength(input);
            conclusions
                .entry(rule.conclusion.clone())
                .and_modify(|current| *current = current.max(strength))
                .or_insert(strength);
        }

        conclusions.into_iter().collect()
    }
}

/// The features of one chunk, grouped by dimension, with dimension weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDefinition {
    features: BTreeSet<ConstructSymbol>,
    weights: BTreeMap<String, f64>,
}

impl ChunkDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feature(mut self, feature: ConstructSymbol) -> Self {
        self.features.insert(feature);
        self
    }

    /// Set the weight of a dimension. Unweighted dimensions weigh 1.0.
    pub fn with_weight(mut self, dim: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(dim.into(), weight);
        self
    }

    pub fn weight(&self, dim: &str) -> f64 {
        self.weights.get(dim).copied().unwrap_or(1.0)
    }

    /// Features grouped by dimension. Features without a dimension-value key
    /// form a dimension of their own, named by the key.
    pub fn dimensions(&self) -> BTreeMap<String, Vec<&ConstructSymbol>> {
        let mut dims: BTreeMap<String, Vec<&ConstructSymbol>> = BTreeMap::new();
        for feature in &self.features {
            let dim = match feature.dimension() {
                Some(dim) => dim.to_string(),
                None => feature.key().to_string(),
            };
            dims.entry(dim).or_default().push(feature);
        }
        dims
    }
}

/// Chunk definitions shared by the cross-level channels.
pub type ChunkDefinitions = BTreeMap<ConstructSymbol, ChunkDefinition>;

/// Chunks activate their features:
/// `feature = max over chunks of chunk * w_dim / n_values_in_dim`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDown {
    chunks: ChunkDefinitions,
}

impl TopDown {
    pub fn new(chunks: ChunkDefinitions) -> Self {
        Self { chunks }
    }
}

impl Channel for TopDown {
    fn apply(&self, input: &ActivationPacket) -> ActivationPacket {
        let mut features: BTreeMap<ConstructSymbol, f64> = BTreeMap::new();

        for (chunk, definition) in &self.chunks {
            let strength = input.strength(chunk);
            for (dim, values) in definition.dimensions() {
                let share = strength * definition.weight(&dim) / values.len() as f64;
                for feature in values {
                    features
                        .entry(feature.clone())
                        .and_modify(|current| *current = current.max(share))
                        .or_insert(share);
                }
            }
        }

        features.into_iter().collect()
    }
}

/// Features activate the chunks they define:
/// `chunk = sum over dims of w_dim * max_value(in) / (sum of w_dim)^1.1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BottomUp {
    chunks: ChunkDefinitions,
}

impl BottomUp {
    const WEIGHT_EXPONENT: f64 = 1.1;

    pub fn new(chunks: ChunkDefinitions) -> Self {
        Self { chunks }
    }
}

impl Channel for BottomUp {
    fn apply(&self, input: &ActivationPacket) -> ActivationPacket {
        self.chunks
            .iter()
            .map(|(chunk, definition)| {
                let mut total_weight = 0.0;
                let mut support = 0.0;

                for (dim, values) in definition.dimensions() {
                    let weight = definition.weight(&dim);
                    let best = values
                        .iter()
                        .map(|feature| input.strength(feature))
                        .fold(0.0, f64::max);
                    total_weight += weight;
                    support += weight * best;
                }

                let strength = if total_weight > 0.0 {
                    support / total_weight.powf(Self::WEIGHT_EXPONENT)
                } else {
                    0.0
                };
                (chunk.clone(), strength)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Pulled;
    use std::rc::Rc;

    fn fruit() -> ChunkDefinitions {
        let mut chunks = ChunkDefinitions::new();
        chunks.insert(
            ConstructSymbol::chunk("APPLE"),
            ChunkDefinition::new()
                .with_feature(ConstructSymbol::feature("color", "red"))
                .with_feature(ConstructSymbol::feature("color", "green"))
                .with_feature(ConstructSymbol::feature("shape", "round")),
        );
        chunks
    }

    #[test]
    fn test_associative_mapping() {
        let a = ConstructSymbol::chunk("A");
        let b = ConstructSymbol::chunk("B");
        let c = ConstructSymbol::chunk("C");
        let mapping = AssociativeMapping::new()
            .with_weight(a.clone(), c.clone(), 0.5)
            .with_weight(b.clone(), c.clone(), 0.25);

        let output = mapping.apply(&ActivationPacket::new().with(a, 1.0).with(b, 2.0));
        assert!((output.strength(&c) - 1.0).abs() < 1e-12);
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_rule_table_takes_max_per_conclusion() {
        let a = ConstructSymbol::chunk("A");
        let b = ConstructSymbol::chunk("B");
        let goal = ConstructSymbol::chunk("GOAL");
        let table = RuleTable::new()
            .with_rule(Rule::new(goal.clone()).with_condition(a.clone(), 0.5).with_condition(b.clone(), 0.5))
            .with_rule(Rule::new(goal.clone()).with_condition(b.clone(), 0.9));

        let output = table.apply(&ActivationPacket::new().with(a, 1.0).with(b, 0.5));
        assert!((output.strength(&goal) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_top_down_splits_dimension_weight() {
        let channel = TopDown::new(fruit());
        let output = channel.apply(&ActivationPacket::new().with(ConstructSymbol::chunk("APPLE"), 1.0));

        assert!((output.strength(&ConstructSymbol::feature("color", "red")) - 0.5).abs() < 1e-12);
        assert!((output.strength(&ConstructSymbol::feature("shape", "round")) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bottom_up_normalizes_by_weight() {
        let channel = BottomUp::new(fruit());
        let input = ActivationPacket::new()
            .with(ConstructSymbol::feature("color", "red"), 1.0)
            .with(ConstructSymbol::feature("shape", "round"), 1.0);

        let output = channel.apply(&input);
        let expected = 2.0 / 2.0_f64.powf(1.1);
        assert!((output.strength(&ConstructSymbol::chunk("APPLE")) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_flow_propagator_merges_inputs_first() {
        let a = ConstructSymbol::chunk("A");
        let b = ConstructSymbol::chunk("B");
        let mut inputs = InputBundle::new();
        inputs.insert(
            a.clone(),
            Pulled::Ready(Rc::new(ActivationPacket::new().with(a.clone(), 0.4).into())),
        );
        inputs.insert(b.clone(), Pulled::Pending);

        let mut flow = FlowPropagator::new(AssociativeMapping::new().with_weight(a, b.clone(), 2.0));
        let output = flow.propagate(&ConstructSymbol::flow_tt("assoc"), &inputs).unwrap();

        assert!((output.as_activation().unwrap().strength(&b) - 0.8).abs() < 1e-12);
    }
}
