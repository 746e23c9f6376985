//! Flow directions - which levels an activation flow reads from and writes to.

use serde::{Deserialize, Serialize};

/// Direction of an activation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    /// Chunk to chunk, within the top level (e.g. rule firing).
    TopLevel,
    /// Feature to feature, within the bottom level (e.g. associative networks).
    BottomLevel,
    /// Chunk to feature.
    TopDown,
    /// Feature to chunk.
    BottomUp,
}

impl FlowDirection {
    /// All directions, in declaration order.
    pub const ALL: [FlowDirection; 4] = [
        FlowDirection::TopLevel,
        FlowDirection::BottomLevel,
        FlowDirection::TopDown,
        FlowDirection::BottomUp,
    ];

    /// Whether the flow reads chunk activations.
    pub fn reads_chunks(self) -> bool {
        matches!(self, FlowDirection::TopLevel | FlowDirection::TopDown)
    }

    /// Whether the flow reads feature activations.
    pub fn reads_features(self) -> bool {
        matches!(self, FlowDirection::BottomLevel | FlowDirection::BottomUp)
    }

    /// Whether the flow writes chunk activations.
    pub fn writes_chunks(self) -> bool {
        matches!(self, FlowDirection::TopLevel | FlowDirection::BottomUp)
    }

    /// Whether the flow writes feature activations.
    pub fn writes_features(self) -> bool {
        matches!(self, FlowDirection::BottomLevel | FlowDirection::TopDown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlowDirection::TopLevel => "top_level",
            FlowDirection::BottomLevel => "bottom_level",
            FlowDirection::TopDown => "top_down",
            FlowDirection::BottomUp => "bottom_up",
        }
    }
}

impl std::fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_direction_reads_and_writes_one_level() {
        for direction in FlowDirection::ALL {
            assert!(direction.reads_chunks() ^ direction.reads_features());
            assert!(direction.writes_chunks() ^ direction.writes_features());
        }
    }

    #[test]
    fn test_cross_level_directions() {
        assert!(FlowDirection::TopDown.reads_chunks());
        assert!(FlowDirection::TopDown.writes_features());
        assert!(FlowDirection::BottomUp.reads_features());
        assert!(FlowDirection::BottomUp.writes_chunks());
    }
}
