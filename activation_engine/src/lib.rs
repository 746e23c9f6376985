//! # Activation Engine
//!
//! Realizes constructs named by `construct_model`, wires them into a
//! dataflow graph from the static link relation, and propagates activation
//! through it one pass at a time.
//!
//! ## Core Components
//!
//! - **connector**: Per-realizer upstream links and pull functions
//! - **propagator**: Node, buffer, flow, actuator and effector computations
//! - **selector**: Boltzmann and categorical selection of discrete choices
//! - **realizer**: Construct and container realizers, scheduling, factories
//! - **config**: Engine parameters, loadable from TOML
//!
//! ## Execution Model
//!
//! - **Single-threaded**: a driver calls `propagate` once per time step
//! - **Immutable outputs**: every pass stores fresh packets; readers keep old ones
//! - **Deterministic**: children, links and packet entries iterate in symbol order

pub mod config;
pub mod connector;
pub mod error;
pub mod propagator;
pub mod realizer;
pub mod selector;

pub use config::*;
pub use connector::*;
pub use error::*;
pub use propagator::*;
pub use realizer::*;
pub use selector::*;
