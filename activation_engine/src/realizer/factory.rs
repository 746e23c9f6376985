//! Factories - scaffolding containers from templates and building
//! configured basic realizers.

use construct_model::{ConstructSymbol, LinkRule, StandardLinks, Template};
use std::rc::Rc;

use super::{ConstructRealizer, ContainerRealizer};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::propagator::{
    ActuatorPropagator, BufferPropagator, Channel, EffectorPropagator, FlowPropagator,
    GatedPropagator, NodePropagator,
};

/// Build an empty container matching `template`, wired by [`StandardLinks`].
///
/// Nested container templates become nested empty containers. No basic
/// realizers are created; every template member starts out missing.
pub fn make_realizer(template: &Template) -> Result<ContainerRealizer, EngineError> {
    make_realizer_with(template, Rc::new(StandardLinks))
}

/// Like [`make_realizer`], with a custom link relation for every level.
pub fn make_realizer_with(
    template: &Template,
    rule: Rc<dyn LinkRule>,
) -> Result<ContainerRealizer, EngineError> {
    template.validate()?;
    scaffold(template, &rule)
}

fn scaffold(template: &Template, rule: &Rc<dyn LinkRule>) -> Result<ContainerRealizer, EngineError> {
    let mut container = ContainerRealizer::with_rule(template.symbol.clone(), Rc::clone(rule))?;
    for nested in &template.containers {
        container.insert(scaffold(nested, rule)?)?;
    }
    Ok(container.with_template(template.clone()))
}

/// Build an empty subsystem expecting `members`.
pub fn make_subsystem(
    name: impl Into<String>,
    members: impl IntoIterator<Item = ConstructSymbol>,
) -> Result<ContainerRealizer, EngineError> {
    make_realizer(&Template::new(ConstructSymbol::subsystem(name)).with_members(members))
}

/// Build an empty agent expecting `buffers` and one nested subsystem per
/// template in `subsystems`.
pub fn make_agent(
    name: impl Into<String>,
    buffers: impl IntoIterator<Item = ConstructSymbol>,
    subsystems: impl IntoIterator<Item = Template>,
) -> Result<ContainerRealizer, EngineError> {
    let template = subsystems.into_iter().fold(
        Template::new(ConstructSymbol::agent(name)).with_members(buffers),
        Template::with_container,
    );
    make_realizer(&template)
}

/// A feature or chunk node.
pub fn node(symbol: ConstructSymbol, config: &EngineConfig) -> ConstructRealizer {
    ConstructRealizer::new(symbol, NodePropagator::new(config.combination, config.pending))
}

/// A node whose output is scaled by `gate`'s strength for it.
pub fn gated_node(
    symbol: ConstructSymbol,
    gate: ConstructSymbol,
    config: &EngineConfig,
) -> ConstructRealizer {
    let propagator = GatedPropagator::new(NodePropagator::new(config.combination, config.pending), gate)
        .with_pending(config.pending);
    ConstructRealizer::new(symbol, propagator)
}

/// A buffer receiving external input.
pub fn buffer(symbol: ConstructSymbol, config: &EngineConfig) -> ConstructRealizer {
    ConstructRealizer::new(symbol, BufferPropagator::new(config.combination, config.pending))
}

/// A flow applying `channel`.
pub fn flow<C: Channel + 'static>(
    symbol: ConstructSymbol,
    channel: C,
    config: &EngineConfig,
) -> ConstructRealizer {
    let propagator = FlowPropagator::new(channel)
        .with_combination(config.combination)
        .with_pending(config.pending);
    ConstructRealizer::new(symbol, propagator)
}

/// A response unit choosing among `options` with the configured selector.
/// An empty option list offers whatever the inputs mention.
pub fn actuator(
    symbol: ConstructSymbol,
    options: impl IntoIterator<Item = ConstructSymbol>,
    config: &EngineConfig,
) -> Result<ConstructRealizer, EngineError> {
    let selector = config.selector()?;

    let options: Vec<ConstructSymbol> = options.into_iter().collect();
    let mut propagator = ActuatorPropagator::new(selector)
        .with_combination(config.combination)
        .with_pending(config.pending);
    if !options.is_empty() {
        propagator = propagator.with_options(options);
    }

    Ok(ConstructRealizer::new(symbol, propagator))
}

/// A behavior unit issuing `commands` for chosen options.
pub fn behavior(
    symbol: ConstructSymbol,
    commands: impl IntoIterator<Item = (ConstructSymbol, ConstructSymbol)>,
    config: &EngineConfig,
) -> ConstructRealizer {
    let propagator = commands
        .into_iter()
        .fold(EffectorPropagator::new(), |effector, (option, command)| {
            effector.with_command(option, command)
        })
        .with_pending(config.pending);
    ConstructRealizer::new(symbol, propagator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SelectorError;
    use construct_model::ModelError;

    fn nacs() -> Template {
        Template::new(ConstructSymbol::subsystem("nacs")).with_members([
            ConstructSymbol::chunk("APPLE"),
            ConstructSymbol::feature("color", "red"),
            ConstructSymbol::response("main"),
        ])
    }

    #[test]
    fn test_make_agent_scaffolds_nested_containers() {
        let agent = make_agent("alice", [ConstructSymbol::buffer("stimulus")], [nacs()]).unwrap();

        let nested = agent.container(&ConstructSymbol::subsystem("nacs")).unwrap();
        assert!(nested.is_empty());
        assert_eq!(nested.missing().len(), 3);

        assert_eq!(agent.missing(), vec![ConstructSymbol::buffer("stimulus")]);
        assert_eq!(agent.missing_recursive().len(), 4);
        assert!(!agent.ready());
    }

    #[test]
    fn test_filling_the_template_makes_it_ready() {
        let config = EngineConfig::default();
        let mut subsystem = make_subsystem(
            "nacs",
            [ConstructSymbol::chunk("APPLE"), ConstructSymbol::buffer("stimulus")],
        )
        .unwrap();

        subsystem
            .insert(node(ConstructSymbol::chunk("APPLE"), &config))
            .unwrap();
        subsystem
            .insert(buffer(ConstructSymbol::buffer("stimulus"), &config))
            .unwrap();

        assert!(subsystem.missing().is_empty());
        assert!(subsystem.ready());
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let template = Template::new(ConstructSymbol::agent("alice"))
            .with_member(ConstructSymbol::chunk("APPLE"));

        assert!(matches!(
            make_realizer(&template),
            Err(EngineError::Model(ModelError::UnexpectedMember { .. }))
        ));
    }

    #[test]
    fn test_actuator_rejects_bad_temperature() {
        let config = EngineConfig {
            temperature: -1.0,
            ..EngineConfig::default()
        };

        let result = actuator(
            ConstructSymbol::response("main"),
            std::iter::empty::<ConstructSymbol>(),
            &config,
        );
        assert!(matches!(
            result,
            Err(EngineError::Selector(SelectorError::InvalidTemperature(_)))
        ));
    }
}
