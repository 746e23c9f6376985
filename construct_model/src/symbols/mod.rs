//! Construct symbols - the names of everything the engine simulates.
//!
//! A symbol is a `(kind, key)` pair. The kind drives wiring (see
//! [`crate::links`]); the key tells constructs of the same kind apart.

mod flow;

pub use flow::*;

use serde::{Deserialize, Serialize};

/// The kind of a construct.
///
/// Features and chunks are both *nodes*; subsystems and agents are both
/// *containers*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    /// A bottom-level feature node, usually keyed by a dimension-value pair.
    Feature,
    /// A top-level chunk node.
    Chunk,
    /// An activation flow between or within levels.
    Flow(FlowDirection),
    /// A buffer holding activation supplied from outside the graph.
    Buffer,
    /// A response (decision) unit.
    Response,
    /// A behavior unit turning decisions into commands.
    Behavior,
    /// A container of basic constructs.
    Subsystem,
    /// A container of buffers and subsystems.
    Agent,
}

impl ConstructKind {
    /// Every kind, with one entry per flow direction.
    pub fn all() -> Vec<ConstructKind> {
        let mut kinds = vec![ConstructKind::Feature, ConstructKind::Chunk];
        kinds.extend(FlowDirection::ALL.into_iter().map(ConstructKind::Flow));
        kinds.extend([
            ConstructKind::Buffer,
            ConstructKind::Response,
            ConstructKind::Behavior,
            ConstructKind::Subsystem,
            ConstructKind::Agent,
        ]);
        kinds
    }

    /// Features and chunks.
    pub fn is_node(self) -> bool {
        matches!(self, ConstructKind::Feature | ConstructKind::Chunk)
    }

    pub fn is_flow(self) -> bool {
        matches!(self, ConstructKind::Flow(_))
    }

    /// Subsystems and agents.
    pub fn is_container(self) -> bool {
        matches!(self, ConstructKind::Subsystem | ConstructKind::Agent)
    }

    /// Whether a container of this kind may hold a member of kind `member`.
    pub fn may_contain(self, member: ConstructKind) -> bool {
        match self {
            ConstructKind::Agent => {
                matches!(member, ConstructKind::Buffer | ConstructKind::Subsystem)
            }
            ConstructKind::Subsystem => matches!(
                member,
                ConstructKind::Feature
                    | ConstructKind::Chunk
                    | ConstructKind::Flow(_)
                    | ConstructKind::Buffer
                    | ConstructKind::Response
                    | ConstructKind::Behavior
            ),
            _ => false,
        }
    }

    /// Short category name, independent of flow direction.
    pub fn category(self) -> &'static str {
        match self {
            ConstructKind::Feature => "feature",
            ConstructKind::Chunk => "chunk",
            ConstructKind::Flow(_) => "flow",
            ConstructKind::Buffer => "buffer",
            ConstructKind::Response => "response",
            ConstructKind::Behavior => "behavior",
            ConstructKind::Subsystem => "subsystem",
            ConstructKind::Agent => "agent",
        }
    }
}

impl std::fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstructKind::Flow(direction) => write!(f, "flow({})", direction),
            other => f.write_str(other.category()),
        }
    }
}

/// The discriminating part of a construct symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstructKey {
    /// A plain name, e.g. `"APPLE"`.
    Name(String),
    /// A dimension-value pair, e.g. `color = red`.
    DimValue { dim: String, value: String },
}

impl std::fmt::Display for ConstructKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstructKey::Name(name) => f.write_str(name),
            ConstructKey::DimValue { dim, value } => write!(f, "{}={}", dim, value),
        }
    }
}

/// Immutable identifier of a construct.
///
/// Equality, hashing and ordering are by `(kind, key)`. Symbols are used as
/// map keys throughout the engine, so the ordering doubles as the
/// deterministic iteration order for wiring and propagation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstructSymbol {
    kind: ConstructKind,
    key: ConstructKey,
}

impl ConstructSymbol {
    /// Create a symbol from its parts.
    pub fn new(kind: ConstructKind, key: ConstructKey) -> Self {
        Self { kind, key }
    }

    /// Create a named symbol of the given kind.
    pub fn named(kind: ConstructKind, name: impl Into<String>) -> Self {
        Self::new(kind, ConstructKey::Name(name.into()))
    }

    /// Create a feature symbol from a dimension-value pair.
    pub fn feature(dim: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            ConstructKind::Feature,
            ConstructKey::DimValue {
                dim: dim.into(),
                value: value.into(),
            },
        )
    }

    /// Create a chunk symbol.
    pub fn chunk(name: impl Into<String>) -> Self {
        Self::named(ConstructKind::Chunk, name)
    }

    /// Create a flow symbol.
    pub fn flow(name: impl Into<String>, direction: FlowDirection) -> Self {
        Self::named(ConstructKind::Flow(direction), name)
    }

    /// Create a top-level (chunk to chunk) flow symbol.
    pub fn flow_tt(name: impl Into<String>) -> Self {
        Self::flow(name, FlowDirection::TopLevel)
    }

    /// Create a bottom-level (feature to feature) flow symbol.
    pub fn flow_bb(name: impl Into<String>) -> Self {
        Self::flow(name, FlowDirection::BottomLevel)
    }

    /// Create a top-down (chunk to feature) flow symbol.
    pub fn flow_td(name: impl Into<String>) -> Self {
        Self::flow(name, FlowDirection::TopDown)
    }

    /// Create a bottom-up (feature to chunk) flow symbol.
    pub fn flow_bu(name: impl Into<String>) -> Self {
        Self::flow(name, FlowDirection::BottomUp)
    }

    /// Create a buffer symbol.
    pub fn buffer(name: impl Into<String>) -> Self {
        Self::named(ConstructKind::Buffer, name)
    }

    /// Create a response symbol.
    pub fn response(name: impl Into<String>) -> Self {
        Self::named(ConstructKind::Response, name)
    }

    /// Create a behavior symbol.
    pub fn behavior(name: impl Into<String>) -> Self {
        Self::named(ConstructKind::Behavior, name)
    }

    /// Create a subsystem symbol.
    pub fn subsystem(name: impl Into<String>) -> Self {
        Self::named(ConstructKind::Subsystem, name)
    }

    /// Create an agent symbol.
    pub fn agent(name: impl Into<String>) -> Self {
        Self::named(ConstructKind::Agent, name)
    }

    pub fn kind(&self) -> ConstructKind {
        self.kind
    }

    pub fn key(&self) -> &ConstructKey {
        &self.key
    }

    /// The feature dimension, for dimension-value keys.
    pub fn dimension(&self) -> Option<&str> {
        match &self.key {
            ConstructKey::DimValue { dim, .. } => Some(dim),
            ConstructKey::Name(_) => None,
        }
    }

    /// Convert the symbol to its string form, `kind:key`.
    pub fn as_string(&self) -> String {
        format!("{}:{}", self.kind, self.key)
    }
}

impl std::fmt::Display for ConstructSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}
