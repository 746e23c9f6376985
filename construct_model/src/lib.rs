//! # Construct Model
//!
//! The vocabulary crate for the activation engine. It names constructs, carries
//! the values that flow between them, and states which constructs feed which.
//! This crate holds no propagation logic.
//!
//! ## Core Components
//!
//! - **symbols**: Construct symbols, kinds and flow directions
//! - **packets**: Immutable activation, decision and composite packets
//! - **links**: The static link relation between construct kinds
//! - **template**: Declarative descriptions of containers, loadable from TOML

pub mod error;
pub mod links;
pub mod packets;
pub mod symbols;
pub mod template;

pub use error::*;
pub use links::*;
pub use packets::*;
pub use symbols::*;
pub use template::*;
