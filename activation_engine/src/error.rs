//! Engine errors.
//!
//! Structural errors (links, constructs, cycles) are raised immediately and
//! name every symbol involved. Propagation failures wrap the propagator's
//! cause together with the construct that raised it.

use construct_model::{ConstructSymbol, ModelError};
use thiserror::Error;

/// Failures raised by selectors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectorError {
    #[error("no viable option among {0} candidates")]
    NoViableOption(usize),

    #[error("temperature must be finite and non-negative, got {0}")]
    InvalidTemperature(f64),

    #[error("threshold must be a number, got {0}")]
    InvalidThreshold(f64),
}

/// Failures raised by propagators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagatorError {
    #[error("input from {0} has not been produced yet")]
    PendingInput(ConstructSymbol),

    #[error("expected {expected} packet from {upstream}, got {found}")]
    UnexpectedPacket {
        upstream: ConstructSymbol,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Errors raised by connectors, realizers and containers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{target} is already linked to {upstream}")]
    DuplicateLink {
        target: ConstructSymbol,
        upstream: ConstructSymbol,
    },

    #[error("{target} has no link to {upstream}")]
    UnknownLink {
        target: ConstructSymbol,
        upstream: ConstructSymbol,
    },

    #[error("{container} already contains {construct}")]
    DuplicateConstruct {
        container: ConstructSymbol,
        construct: ConstructSymbol,
    },

    #[error("{container} does not contain {construct}")]
    UnknownConstruct {
        container: ConstructSymbol,
        construct: ConstructSymbol,
    },

    #[error("{container} may not contain {construct}")]
    UnexpectedConstruct {
        container: ConstructSymbol,
        construct: ConstructSymbol,
    },

    #[error("{construct} is linked to {upstream}, which {container} neither contains nor receives")]
    ForeignLink {
        container: ConstructSymbol,
        construct: ConstructSymbol,
        upstream: ConstructSymbol,
    },

    #[error("cyclic dependency in {container} among [{}]", join_symbols(.involved))]
    CyclicDependency {
        container: ConstructSymbol,
        involved: Vec<ConstructSymbol>,
    },

    #[error("failed to propagate {construct}: {cause}")]
    Propagation {
        construct: ConstructSymbol,
        #[source]
        cause: PropagatorError,
    },

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("{0} has no links and belongs to no container")]
    NotWired(ConstructSymbol),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to parse engine config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read engine config: {0}")]
    Io(#[from] std::io::Error),
}

fn join_symbols(symbols: &[ConstructSymbol]) -> String {
    symbols
        .iter()
        .map(|symbol| symbol.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
