//! Container realizers - subsystems and agents.
//!
//! A container owns its children and keeps their links consistent with the
//! static link relation:
//! 1. **Insert**: the new child is linked both ways with every sibling the
//!    relation pairs it with, and receives accepting links from outside
//! 2. **Remove**: every link to or from the child is retracted
//! 3. **Propagate**: children run in dependency order over same-pass links
//!
//! No child ever holds a link to a symbol that is neither a sibling nor
//! supplied to the container from outside. A failed insert changes nothing,
//! and a failed pass restores every output, state and random source it
//! touched, so it can be retried.

use construct_model::{
    CompositePacket, ConstructKind, ConstructSymbol, LinkRule, LinkTiming, ModelError, Packet,
    StandardLinks, Template,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use super::{
    topological_order, ConstructRealizer, Realizer, RealizerState, SavedRealizer, Snapshot, Stimuli,
};
use crate::connector::{Connector, OutputCell, PullFn};
use crate::error::EngineError;

/// A realizer that owns and wires other realizers.
pub struct ContainerRealizer {
    symbol: ConstructSymbol,
    connector: Connector,
    children: BTreeMap<ConstructSymbol, Realizer>,
    rule: Rc<dyn LinkRule>,
    template: Option<Template>,
    output: OutputCell,
    state: RealizerState,
}

impl ContainerRealizer {
    /// Create an empty container wired by [`StandardLinks`].
    pub fn new(symbol: ConstructSymbol) -> Result<Self, EngineError> {
        Self::with_rule(symbol, Rc::new(StandardLinks))
    }

    /// Create an empty container wired by a custom link relation.
    pub fn with_rule(symbol: ConstructSymbol, rule: Rc<dyn LinkRule>) -> Result<Self, EngineError> {
        if !symbol.kind().is_container() {
            return Err(ModelError::NotAContainer(symbol).into());
        }

        Ok(Self {
            connector: Connector::new(symbol.clone()),
            symbol,
            children: BTreeMap::new(),
            rule,
            template: None,
            output: OutputCell::new(),
            state: RealizerState::Wired,
        })
    }

    /// Attach the template [`ContainerRealizer::missing`] checks against.
    pub fn with_template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    pub fn symbol(&self) -> &ConstructSymbol {
        &self.symbol
    }

    pub fn state(&self) -> RealizerState {
        self.state
    }

    /// Links supplied from outside the container.
    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn rule(&self) -> &dyn LinkRule {
        self.rule.as_ref()
    }

    /// The composite packet of the last pass.
    pub fn output(&self) -> Option<Rc<Packet>> {
        self.output.get()
    }

    pub fn output_cell(&self) -> &OutputCell {
        &self.output
    }

    /// Add a child and wire it to its siblings.
    ///
    /// Links the child already holds must point at siblings or at symbols
    /// supplied from outside, else [`EngineError::ForeignLink`]. A link the
    /// relation would add to or from a sibling must not exist yet, else
    /// [`EngineError::DuplicateLink`]. Every check runs before any link is
    /// added.
    pub fn insert(&mut self, realizer: impl Into<Realizer>) -> Result<(), EngineError> {
        let mut realizer = realizer.into();
        let symbol = realizer.symbol().clone();

        if !self.symbol.kind().may_contain(symbol.kind()) {
            return Err(EngineError::UnexpectedConstruct {
                container: self.symbol.clone(),
                construct: symbol,
            });
        }
        if self.children.contains_key(&symbol) {
            return Err(EngineError::DuplicateConstruct {
                container: self.symbol.clone(),
                construct: symbol,
            });
        }
        if let Some(upstream) = realizer.connector().sources().find(|upstream| {
            !self.children.contains_key(*upstream) && !self.connector.is_linked(upstream)
        }) {
            return Err(EngineError::ForeignLink {
                container: self.symbol.clone(),
                construct: symbol,
                upstream: upstream.clone(),
            });
        }

        let plan = self.plan_links(&symbol);
        if let Some((upstream, _)) = plan
            .incoming
            .iter()
            .find(|(upstream, _)| realizer.is_linked(upstream))
        {
            return Err(EngineError::DuplicateLink {
                target: symbol,
                upstream: upstream.clone(),
            });
        }
        if let Some((target, _)) = plan
            .outgoing
            .iter()
            .find(|(target, _)| {
                self.children
                    .get(target)
                    .is_some_and(|sibling| sibling.is_linked(&symbol))
            })
        {
            return Err(EngineError::DuplicateLink {
                target: target.clone(),
                upstream: symbol,
            });
        }

        for (upstream, timing) in plan.incoming {
            if let Some(sibling) = self.children.get(&upstream) {
                let pull = sibling.output_cell().puller(timing);
                realizer.add_link(upstream, pull)?;
            }
        }
        for (upstream, pull) in plan.external {
            if !realizer.is_linked(&upstream) {
                realizer.add_link(upstream, pull)?;
            }
        }
        for (target, timing) in plan.outgoing {
            if let Some(sibling) = self.children.get_mut(&target) {
                sibling.add_link(symbol.clone(), realizer.output_cell().puller(timing))?;
            }
        }

        realizer.mark_wired();
        tracing::debug!(container = %self.symbol, construct = %symbol, "construct inserted");
        self.children.insert(symbol, realizer);
        self.state = self.state.after_link_change();
        Ok(())
    }

    /// Links the relation requires between `symbol` and the current
    /// children and external upstreams.
    fn plan_links(&self, symbol: &ConstructSymbol) -> LinkPlan {
        let incoming = self
            .children
            .keys()
            .filter_map(|sibling| {
                self.rule
                    .links(sibling, symbol)
                    .map(|timing| (sibling.clone(), timing))
            })
            .collect();
        let outgoing = self
            .children
            .keys()
            .filter_map(|sibling| {
                self.rule
                    .links(symbol, sibling)
                    .map(|timing| (sibling.clone(), timing))
            })
            .collect();
        let external = self
            .connector
            .links()
            .filter(|(upstream, _)| self.rule.links(upstream, symbol).is_some())
            .map(|(upstream, pull)| (upstream.clone(), Rc::clone(pull)))
            .collect();

        LinkPlan {
            incoming,
            outgoing,
            external,
        }
    }

    /// Remove a child, retracting every link that referenced it.
    ///
    /// The returned realizer holds no links and, unless it is a container,
    /// is back to [`RealizerState::Uninitialized`].
    pub fn remove(&mut self, symbol: &ConstructSymbol) -> Result<Realizer, EngineError> {
        let mut realizer =
            self.children
                .remove(symbol)
                .ok_or_else(|| EngineError::UnknownConstruct {
                    container: self.symbol.clone(),
                    construct: symbol.clone(),
                })?;

        for sibling in self.children.values_mut() {
            sibling.discard_link(symbol);
        }
        realizer.detach();

        tracing::debug!(container = %self.symbol, construct = %symbol, "construct removed");
        self.state = self.state.after_link_change();
        Ok(realizer)
    }

    /// Accept a link from outside and forward it to every child that the
    /// link relation says should read it.
    pub fn add_link(&mut self, upstream: ConstructSymbol, pull: PullFn) -> Result<(), EngineError> {
        self.connector.add_link(upstream.clone(), Rc::clone(&pull))?;

        let rule = Rc::clone(&self.rule);
        for (symbol, child) in self.children.iter_mut() {
            if rule.links(&upstream, symbol).is_some() && !child.is_linked(&upstream) {
                child.add_link(upstream.clone(), Rc::clone(&pull))?;
            }
        }

        self.state = self.state.after_link_change();
        Ok(())
    }

    /// Drop a link supplied from outside, from the container and its children.
    pub fn drop_link(&mut self, upstream: &ConstructSymbol) -> Result<(), EngineError> {
        self.connector.drop_link(upstream)?;
        self.retract_external(upstream);
        Ok(())
    }

    pub fn discard_link(&mut self, upstream: &ConstructSymbol) -> bool {
        let removed = self.connector.discard_link(upstream);
        if removed {
            self.retract_external(upstream);
        }
        removed
    }

    /// Drop every link supplied from outside. Links between children stay.
    pub fn clear_links(&mut self) {
        let upstreams: Vec<ConstructSymbol> = self.connector.sources().cloned().collect();
        for upstream in &upstreams {
            self.discard_link(upstream);
        }
    }

    fn retract_external(&mut self, upstream: &ConstructSymbol) {
        for child in self.children.values_mut() {
            child.discard_link(upstream);
        }
        self.state = self.state.after_link_change();
    }

    pub fn contains(&self, symbol: &ConstructSymbol) -> bool {
        self.children.contains_key(symbol)
    }

    /// Whether `symbol` is a child or a descendant of a nested container.
    pub fn contains_recursive(&self, symbol: &ConstructSymbol) -> bool {
        self.find(symbol).is_some()
    }

    pub fn get(&self, symbol: &ConstructSymbol) -> Option<&Realizer> {
        self.children.get(symbol)
    }

    pub(crate) fn get_mut(&mut self, symbol: &ConstructSymbol) -> Option<&mut Realizer> {
        self.children.get_mut(symbol)
    }

    /// Look `symbol` up among the children and, failing that, in nested
    /// containers.
    pub fn find(&self, symbol: &ConstructSymbol) -> Option<&Realizer> {
        self.children.get(symbol).or_else(|| {
            self.containers()
                .find_map(|container| container.find(symbol))
        })
    }

    pub fn realizer(&self, symbol: &ConstructSymbol) -> Option<&ConstructRealizer> {
        self.get(symbol).and_then(Realizer::as_construct)
    }

    pub fn container(&self, symbol: &ConstructSymbol) -> Option<&ContainerRealizer> {
        self.get(symbol).and_then(Realizer::as_container)
    }

    pub fn container_mut(&mut self, symbol: &ConstructSymbol) -> Option<&mut ContainerRealizer> {
        self.get_mut(symbol).and_then(Realizer::as_container_mut)
    }

    /// Direct children, in symbol order.
    pub fn children(&self) -> impl Iterator<Item = (&ConstructSymbol, &Realizer)> {
        self.children.iter()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &ConstructSymbol> {
        self.children.keys()
    }

    fn containers(&self) -> impl Iterator<Item = &ContainerRealizer> {
        self.children.values().filter_map(Realizer::as_container)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Every `(upstream, child)` link held by a direct child.
    pub fn links(&self) -> BTreeSet<(ConstructSymbol, ConstructSymbol)> {
        self.children
            .iter()
            .flat_map(|(target, child)| {
                child
                    .connector()
                    .sources()
                    .map(move |upstream| (upstream.clone(), target.clone()))
            })
            .collect()
    }

    /// Template members not inserted yet.
    pub fn missing(&self) -> Vec<ConstructSymbol> {
        self.template
            .iter()
            .flat_map(|template| template.expected())
            .filter(|symbol| !self.children.contains_key(symbol))
            .cloned()
            .collect()
    }

    /// Template members not inserted yet, here and in every nested container.
    pub fn missing_recursive(&self) -> BTreeSet<ConstructSymbol> {
        let mut missing: BTreeSet<ConstructSymbol> = self.missing().into_iter().collect();
        for container in self.containers() {
            missing.extend(container.missing_recursive());
        }
        missing
    }

    /// Links the relation requires between expected constructs that no child
    /// holds yet, as `(upstream, child)` pairs.
    pub fn unmet_links(&self) -> Vec<(ConstructSymbol, ConstructSymbol)> {
        let mut expected: BTreeSet<&ConstructSymbol> = self.children.keys().collect();
        if let Some(template) = &self.template {
            expected.extend(template.expected());
        }

        let mut unmet = Vec::new();
        for (target, child) in &self.children {
            for upstream in &expected {
                if self.rule.links(upstream, target).is_some() && !child.is_linked(upstream) {
                    unmet.push(((*upstream).clone(), target.clone()));
                }
            }
        }
        unmet
    }

    /// Whether every expected construct is present and every required link
    /// is populated, recursively.
    pub fn ready(&self) -> bool {
        self.missing().is_empty()
            && self.unmet_links().is_empty()
            && self.containers().all(ContainerRealizer::ready)
    }

    /// The order the next pass will run the children in.
    pub fn schedule(&self) -> Result<Vec<ConstructSymbol>, EngineError> {
        let mut edges = Vec::new();
        for (target, child) in &self.children {
            for upstream in child.connector().sources() {
                if self.children.contains_key(upstream)
                    && self.rule.links(upstream, target) == Some(LinkTiming::SamePass)
                {
                    edges.push((upstream, target));
                }
            }
        }

        topological_order(self.children.keys(), edges).map_err(|involved| {
            EngineError::CyclicDependency {
                container: self.symbol.clone(),
                involved,
            }
        })
    }

    /// Run one pass over every child.
    pub fn propagate(&mut self) -> Result<Rc<Packet>, EngineError> {
        self.propagate_with(&Stimuli::new())
    }

    /// Run one pass, feeding each stimulus to the construct it names.
    pub fn propagate_with(&mut self, stimuli: &Stimuli) -> Result<Rc<Packet>, EngineError> {
        if let Some(unknown) = stimuli.symbols().find(|symbol| !self.contains_recursive(symbol)) {
            return Err(EngineError::UnknownConstruct {
                container: self.symbol.clone(),
                construct: unknown.clone(),
            });
        }

        self.run(stimuli)
    }

    pub(crate) fn run(&mut self, stimuli: &Stimuli) -> Result<Rc<Packet>, EngineError> {
        let span = tracing::debug_span!("propagate", container = %self.symbol);
        let _enter = span.enter();

        let order = self.schedule()?;
        let saved = self.save();
        if let Err(error) = self.run_children(&order, stimuli) {
            tracing::debug!(container = %self.symbol, "pass rolled back");
            self.restore(saved);
            return Err(error);
        }

        let composite: CompositePacket = self
            .children
            .iter()
            .filter(|(symbol, _)| is_terminal(symbol.kind()))
            .filter_map(|(symbol, child)| {
                child
                    .output()
                    .map(|packet| (symbol.clone(), Packet::clone(&packet)))
            })
            .collect();

        tracing::debug!(container = %self.symbol, outputs = composite.len(), "pass complete");
        self.state = RealizerState::Ready;
        Ok(self.output.set(composite.into()))
    }

    fn run_children(
        &mut self,
        order: &[ConstructSymbol],
        stimuli: &Stimuli,
    ) -> Result<(), EngineError> {
        for child in self.children.values() {
            child.output_cell().latch();
        }
        for symbol in order {
            if let Some(child) = self.children.get_mut(symbol) {
                child.run(stimuli)?;
            }
        }
        Ok(())
    }

    pub(super) fn save(&self) -> SavedRealizer {
        SavedRealizer {
            output: self.output.save(),
            state: self.state,
            propagator: None,
            children: self.children.values().map(Realizer::save).collect(),
        }
    }

    pub(super) fn restore(&mut self, saved: SavedRealizer) {
        self.output.restore(saved.output);
        self.state = saved.state;
        for (child, saved) in self.children.values_mut().zip(saved.children) {
            child.restore(saved);
        }
    }

    /// Forget every output, here and below, and reset every propagator.
    /// Links are untouched.
    pub fn clear_activations(&mut self) {
        for child in self.children.values_mut() {
            child.clear_activations();
        }
        self.output.clear();
        self.state = RealizerState::Wired;
    }

    /// The state and last output of this container and every child,
    /// recursively.
    pub fn capture(&self) -> Snapshot {
        Snapshot {
            symbol: self.symbol.to_string(),
            state: self.state,
            output: self.output().as_deref().cloned(),
            children: Some(
                self.children
                    .iter()
                    .map(|(symbol, child)| (symbol.to_string(), child.capture()))
                    .collect(),
            ),
        }
    }

    /// [`ContainerRealizer::capture`] as JSON.
    pub fn snapshot(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self.capture())
    }
}

struct LinkPlan {
    /// Siblings the new child reads.
    incoming: Vec<(ConstructSymbol, LinkTiming)>,
    /// Siblings that read the new child.
    outgoing: Vec<(ConstructSymbol, LinkTiming)>,
    external: Vec<(ConstructSymbol, PullFn)>,
}

/// Members whose outputs make up a container's composite packet.
fn is_terminal(kind: ConstructKind) -> bool {
    matches!(kind, ConstructKind::Response | ConstructKind::Behavior) || kind.is_container()
}

impl fmt::Debug for ContainerRealizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRealizer")
            .field("symbol", &self.symbol)
            .field("connector", &self.connector)
            .field("children", &self.children)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
