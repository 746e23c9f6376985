//! Packets - the immutable values realizers produce and pull from each other.
//!
//! Every realizer emits a [`Packet`]:
//! - **Activation**: strengths keyed by construct symbol (nodes, flows, buffers)
//! - **Decision**: a selector's choices and the distribution behind them
//! - **Composite**: the terminal outputs of a container

mod activation;
mod decision;

pub use activation::*;
pub use decision::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::symbols::ConstructSymbol;

/// Output of one realizer for one propagation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    Activation(ActivationPacket),
    Decision(DecisionPacket),
    Composite(CompositePacket),
}

impl Packet {
    pub fn as_activation(&self) -> Option<&ActivationPacket> {
        match self {
            Packet::Activation(packet) => Some(packet),
            _ => None,
        }
    }

    pub fn as_decision(&self) -> Option<&DecisionPacket> {
        match self {
            Packet::Decision(packet) => Some(packet),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositePacket> {
        match self {
            Packet::Composite(packet) => Some(packet),
            _ => None,
        }
    }

    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Packet::Activation(_) => "activation",
            Packet::Decision(_) => "decision",
            Packet::Composite(_) => "composite",
        }
    }
}

impl From<ActivationPacket> for Packet {
    fn from(packet: ActivationPacket) -> Self {
        Packet::Activation(packet)
    }
}

impl From<DecisionPacket> for Packet {
    fn from(packet: DecisionPacket) -> Self {
        Packet::Decision(packet)
    }
}

impl From<CompositePacket> for Packet {
    fn from(packet: CompositePacket) -> Self {
        Packet::Composite(packet)
    }
}

/// Outputs of a container's terminal members, keyed by member symbol.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompositePacket {
    #[serde(with = "entries")]
    members: BTreeMap<ConstructSymbol, Packet>,
}

impl CompositePacket {
    pub fn get(&self, symbol: &ConstructSymbol) -> Option<&Packet> {
        self.members.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConstructSymbol, &Packet)> {
        self.members.iter()
    }
}

impl FromIterator<(ConstructSymbol, Packet)> for CompositePacket {
    fn from_iter<I: IntoIterator<Item = (ConstructSymbol, Packet)>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

/// Serializes symbol-keyed maps as ordered `[key, value]` lists, so formats
/// that only allow string map keys (JSON) can carry them.
mod entries {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let entries: Vec<(K, V)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_variant_access() {
        let packet = Packet::from(ActivationPacket::new().with(ConstructSymbol::chunk("A"), 1.0));

        assert!(packet.as_activation().is_some());
        assert!(packet.as_decision().is_none());
        assert_eq!(packet.type_name(), "activation");
    }

    #[test]
    fn test_composite_packet_json() {
        let response = ConstructSymbol::response("main");
        let decision = DecisionPacket::new(
            vec![ConstructSymbol::chunk("A")],
            ActivationPacket::new().with(ConstructSymbol::chunk("A"), 1.0),
            ActivationPacket::new().with(ConstructSymbol::chunk("A"), 1.0),
        );
        let composite: CompositePacket = [(response.clone(), Packet::from(decision))]
            .into_iter()
            .collect();
        let packet = Packet::from(composite);

        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["type"], "composite");

        let back: Packet = serde_json::from_value(json).unwrap();
        assert_eq!(back, packet);
        assert!(back.as_composite().unwrap().get(&response).is_some());
    }
}
