//! Realizers - the runtime objects that give constructs behavior and a place
//! in the graph.
//!
//! A [`ConstructRealizer`] is a symbol, a connector, a propagator and the
//! last packet it produced. A [`ContainerRealizer`] owns realizers (nested
//! containers included) and wires them from the static link relation.

mod container;
mod factory;
mod schedule;

pub use container::*;
pub use factory::*;
pub use schedule::*;

use construct_model::{ConstructSymbol, Packet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::connector::{Connector, OutputCell, PullFn, Pulled, SavedCell};
use crate::error::EngineError;
use crate::propagator::Propagator;
use crate::selector::Checkpoint;

/// Lifecycle of a realizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealizerState {
    /// Constructed; no links and no container yet.
    Uninitialized,
    /// Linked or inserted, with no output since construction or the last clear.
    Wired,
    /// Holds output from the last propagation.
    Ready,
    /// Links changed after the last propagation.
    Stale,
}

impl RealizerState {
    pub fn as_str(self) -> &'static str {
        match self {
            RealizerState::Uninitialized => "uninitialized",
            RealizerState::Wired => "wired",
            RealizerState::Ready => "ready",
            RealizerState::Stale => "stale",
        }
    }

    fn after_link_change(self) -> Self {
        match self {
            RealizerState::Uninitialized => RealizerState::Wired,
            RealizerState::Ready => RealizerState::Stale,
            other => other,
        }
    }
}

/// A basic construct: one connector, one propagator, one output.
pub struct ConstructRealizer {
    symbol: ConstructSymbol,
    connector: Connector,
    propagator: Box<dyn Propagator>,
    output: OutputCell,
    state: RealizerState,
}

impl ConstructRealizer {
    pub fn new(symbol: ConstructSymbol, propagator: impl Propagator + 'static) -> Self {
        Self {
            connector: Connector::new(symbol.clone()),
            symbol,
            propagator: Box::new(propagator),
            output: OutputCell::new(),
            state: RealizerState::Uninitialized,
        }
    }

    pub fn symbol(&self) -> &ConstructSymbol {
        &self.symbol
    }

    pub fn state(&self) -> RealizerState {
        self.state
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    /// The last packet produced, if any.
    pub fn output(&self) -> Option<Rc<Packet>> {
        self.output.get()
    }

    pub fn output_cell(&self) -> &OutputCell {
        &self.output
    }

    pub fn add_link(&mut self, upstream: ConstructSymbol, pull: PullFn) -> Result<(), EngineError> {
        self.connector.add_link(upstream, pull)?;
        self.state = self.state.after_link_change();
        Ok(())
    }

    pub fn drop_link(&mut self, upstream: &ConstructSymbol) -> Result<(), EngineError> {
        self.connector.drop_link(upstream)?;
        self.state = self.state.after_link_change();
        Ok(())
    }

    pub fn discard_link(&mut self, upstream: &ConstructSymbol) -> bool {
        let removed = self.connector.discard_link(upstream);
        if removed {
            self.state = self.state.after_link_change();
        }
        removed
    }

    /// Drop every link.
    pub fn clear_links(&mut self) {
        if !self.connector.is_empty() {
            self.connector.clear();
            self.state = self.state.after_link_change();
        }
    }

    pub(crate) fn mark_wired(&mut self) {
        if self.state == RealizerState::Uninitialized {
            self.state = RealizerState::Wired;
        }
    }

    /// Drop every link and leave the realizer unattached. The last output
    /// stays readable.
    pub(crate) fn detach(&mut self) {
        self.connector.clear();
        self.state = RealizerState::Uninitialized;
    }

    fn save(&self) -> SavedRealizer {
        SavedRealizer {
            output: self.output.save(),
            state: self.state,
            propagator: self.propagator.checkpoint(),
            children: Vec::new(),
        }
    }

    fn restore(&mut self, saved: SavedRealizer) {
        self.output.restore(saved.output);
        self.state = saved.state;
        if let Some(checkpoint) = saved.propagator {
            self.propagator.rewind(checkpoint);
        }
    }

    /// Pull, propagate and store the result.
    pub fn propagate(&mut self) -> Result<Rc<Packet>, EngineError> {
        self.propagate_with(None)
    }

    /// Like [`ConstructRealizer::propagate`], with `external` added to the
    /// bundle under this realizer's own symbol.
    ///
    /// On failure the stored output and state are left untouched.
    pub fn propagate_with(&mut self, external: Option<Packet>) -> Result<Rc<Packet>, EngineError> {
        if self.state == RealizerState::Uninitialized {
            return Err(EngineError::NotWired(self.symbol.clone()));
        }

        let mut inputs = self.connector.pull();
        if let Some(packet) = external {
            inputs.insert(self.symbol.clone(), Pulled::Ready(Rc::new(packet)));
        }

        let packet = self
            .propagator
            .propagate(&self.symbol, &inputs)
            .map_err(|cause| {
                tracing::warn!(construct = %self.symbol, error = %cause, "propagation failed");
                EngineError::Propagation {
                    construct: self.symbol.clone(),
                    cause,
                }
            })?;

        self.state = RealizerState::Ready;
        Ok(self.output.set(packet))
    }

    /// Forget the stored output and reset the propagator. Links stay.
    pub fn clear_activations(&mut self) {
        self.output.clear();
        self.propagator.reset();
        if self.state != RealizerState::Uninitialized {
            self.state = RealizerState::Wired;
        }
    }

    pub fn capture(&self) -> Snapshot {
        Snapshot {
            symbol: self.symbol.to_string(),
            state: self.state,
            output: self.output().as_deref().cloned(),
            children: None,
        }
    }

    /// [`ConstructRealizer::capture`] as JSON.
    pub fn snapshot(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self.capture())
    }
}

impl fmt::Debug for ConstructRealizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructRealizer")
            .field("symbol", &self.symbol)
            .field("connector", &self.connector)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// State and last output of a realizer and, for containers, every child.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub symbol: String,
    pub state: RealizerState,
    pub output: Option<Packet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<BTreeMap<String, Snapshot>>,
}

/// Outputs, states and propagator checkpoints of a realizer tree, put back
/// when a pass fails.
struct SavedRealizer {
    output: SavedCell,
    state: RealizerState,
    propagator: Option<Checkpoint>,
    children: Vec<SavedRealizer>,
}

/// Anything a container can own.
#[derive(Debug)]
pub enum Realizer {
    Construct(ConstructRealizer),
    Container(ContainerRealizer),
}

impl Realizer {
    pub fn symbol(&self) -> &ConstructSymbol {
        match self {
            Realizer::Construct(realizer) => realizer.symbol(),
            Realizer::Container(container) => container.symbol(),
        }
    }

    pub fn state(&self) -> RealizerState {
        match self {
            Realizer::Construct(realizer) => realizer.state(),
            Realizer::Container(container) => container.state(),
        }
    }

    /// Links into this realizer. For containers these are the links supplied
    /// from outside.
    pub fn connector(&self) -> &Connector {
        match self {
            Realizer::Construct(realizer) => realizer.connector(),
            Realizer::Container(container) => container.connector(),
        }
    }

    pub fn output(&self) -> Option<Rc<Packet>> {
        self.output_cell().get()
    }

    pub fn output_cell(&self) -> &OutputCell {
        match self {
            Realizer::Construct(realizer) => realizer.output_cell(),
            Realizer::Container(container) => container.output_cell(),
        }
    }

    pub fn is_linked(&self, upstream: &ConstructSymbol) -> bool {
        self.connector().is_linked(upstream)
    }

    pub(crate) fn add_link(&mut self, upstream: ConstructSymbol, pull: PullFn) -> Result<(), EngineError> {
        match self {
            Realizer::Construct(realizer) => realizer.add_link(upstream, pull),
            Realizer::Container(container) => container.add_link(upstream, pull),
        }
    }

    pub(crate) fn discard_link(&mut self, upstream: &ConstructSymbol) -> bool {
        match self {
            Realizer::Construct(realizer) => realizer.discard_link(upstream),
            Realizer::Container(container) => container.discard_link(upstream),
        }
    }

    pub(crate) fn detach(&mut self) {
        match self {
            Realizer::Construct(realizer) => realizer.detach(),
            Realizer::Container(container) => container.clear_links(),
        }
    }

    pub fn clear_activations(&mut self) {
        match self {
            Realizer::Construct(realizer) => realizer.clear_activations(),
            Realizer::Container(container) => container.clear_activations(),
        }
    }

    pub fn capture(&self) -> Snapshot {
        match self {
            Realizer::Construct(realizer) => realizer.capture(),
            Realizer::Container(container) => container.capture(),
        }
    }

    pub fn snapshot(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self.capture())
    }

    pub fn as_construct(&self) -> Option<&ConstructRealizer> {
        match self {
            Realizer::Construct(realizer) => Some(realizer),
            Realizer::Container(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&ContainerRealizer> {
        match self {
            Realizer::Container(container) => Some(container),
            Realizer::Construct(_) => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut ContainerRealizer> {
        match self {
            Realizer::Container(container) => Some(container),
            Realizer::Construct(_) => None,
        }
    }

    pub(crate) fn mark_wired(&mut self) {
        if let Realizer::Construct(realizer) = self {
            realizer.mark_wired();
        }
    }

    fn save(&self) -> SavedRealizer {
        match self {
            Realizer::Construct(realizer) => realizer.save(),
            Realizer::Container(container) => container.save(),
        }
    }

    fn restore(&mut self, saved: SavedRealizer) {
        match self {
            Realizer::Construct(realizer) => realizer.restore(saved),
            Realizer::Container(container) => container.restore(saved),
        }
    }

    pub(crate) fn run(&mut self, stimuli: &Stimuli) -> Result<Rc<Packet>, EngineError> {
        match self {
            Realizer::Construct(realizer) => {
                let external = stimuli.get(realizer.symbol()).cloned();
                realizer.propagate_with(external)
            }
            Realizer::Container(container) => container.run(stimuli),
        }
    }
}

impl From<ConstructRealizer> for Realizer {
    fn from(realizer: ConstructRealizer) -> Self {
        Realizer::Construct(realizer)
    }
}

impl From<ContainerRealizer> for Realizer {
    fn from(container: ContainerRealizer) -> Self {
        Realizer::Container(container)
    }
}

/// External input for one pass, keyed by the construct that receives it.
///
/// Stimuli may name constructs at any depth below the container propagated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stimuli {
    packets: BTreeMap<ConstructSymbol, Packet>,
}

impl Stimuli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, construct: ConstructSymbol, packet: impl Into<Packet>) -> Self {
        self.packets.insert(construct, packet.into());
        self
    }

    pub fn get(&self, construct: &ConstructSymbol) -> Option<&Packet> {
        self.packets.get(construct)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &ConstructSymbol> {
        self.packets.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
