//! The static link relation - which construct kinds feed which.
//!
//! Wiring is never discovered at runtime. Given two symbols, a [`LinkRule`]
//! decides from their kinds alone whether the first feeds the second and,
//! if so, whether the downstream construct reads the upstream output from
//! the same propagation pass or from the previous one.

use serde::{Deserialize, Serialize};

use crate::symbols::{ConstructKind, ConstructSymbol, FlowDirection};

/// When a downstream construct observes its upstream's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTiming {
    /// The upstream runs first in every pass; the downstream sees this pass's output.
    SamePass,
    /// Recurrent link: the downstream sees the upstream's output from the
    /// previous pass. Ignored when ordering a pass.
    Lagged,
}

/// A pure relation over construct kinds.
pub trait LinkRule {
    /// Whether constructs of kind `source` feed constructs of kind `target`.
    fn link(&self, source: ConstructKind, target: ConstructKind) -> Option<LinkTiming>;

    /// Whether `source` feeds `target`. Symbols never feed themselves.
    fn links(&self, source: &ConstructSymbol, target: &ConstructSymbol) -> Option<LinkTiming> {
        if source == target {
            return None;
        }
        self.link(source.kind(), target.kind())
    }
}

/// The default wiring of a subsystem/agent hierarchy.
///
/// | source                          | target                       | timing    |
/// |---------------------------------|------------------------------|-----------|
/// | buffer                          | feature, chunk, subsystem    | same pass |
/// | feature                         | bottom-up, bottom-level flow | same pass |
/// | chunk                           | top-down, top-level flow     | same pass |
/// | bottom-up flow                  | chunk                        | same pass |
/// | top-down, bottom-level flow     | feature                      | lagged    |
/// | top-level flow                  | chunk                        | lagged    |
/// | feature, chunk, any flow        | response                     | same pass |
/// | response                        | behavior                     | same pass |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardLinks;

impl LinkRule for StandardLinks {
    fn link(&self, source: ConstructKind, target: ConstructKind) -> Option<LinkTiming> {
        use ConstructKind::*;

        match (source, target) {
            (Buffer, Feature | Chunk | Subsystem) => Some(LinkTiming::SamePass),
            (Feature, Flow(direction)) if direction.reads_features() => Some(LinkTiming::SamePass),
            (Chunk, Flow(direction)) if direction.reads_chunks() => Some(LinkTiming::SamePass),
            (Flow(FlowDirection::BottomUp), Chunk) => Some(LinkTiming::SamePass),
            (Flow(FlowDirection::TopLevel), Chunk) => Some(LinkTiming::Lagged),
            (Flow(direction), Feature) if direction.writes_features() => Some(LinkTiming::Lagged),
            (Feature | Chunk | Flow(_), Response) => Some(LinkTiming::SamePass),
            (Response, Behavior) => Some(LinkTiming::SamePass),
            _ => None,
        }
    }
}
