//! End-to-end propagation through containers.

use activation_engine::*;
use construct_model::*;
use std::cell::Cell;
use std::rc::Rc;

fn config() -> EngineConfig {
    EngineConfig {
        seed: Some(42),
        ..EngineConfig::default()
    }
}

fn apple() -> ConstructSymbol {
    ConstructSymbol::chunk("APPLE")
}

fn pear() -> ConstructSymbol {
    ConstructSymbol::chunk("PEAR")
}

fn stimulus() -> ConstructSymbol {
    ConstructSymbol::buffer("stimulus")
}

fn main_response() -> ConstructSymbol {
    ConstructSymbol::response("main")
}

fn act() -> ConstructSymbol {
    ConstructSymbol::behavior("act")
}

fn eat(config: &EngineConfig) -> ConstructRealizer {
    behavior(
        act(),
        [
            (apple(), ConstructSymbol::behavior("eat_apple")),
            (pear(), ConstructSymbol::behavior("eat_pear")),
        ],
        config,
    )
}

/// stimulus -> chunks -> associative flow -> response -> behavior
fn fruit_subsystem() -> ContainerRealizer {
    let config = config();
    let act = eat(&config);
    fruit_subsystem_with(&config, act)
}

fn fruit_subsystem_with(config: &EngineConfig, act: ConstructRealizer) -> ContainerRealizer {
    let mut subsystem = make_subsystem(
        "nacs",
        [
            stimulus(),
            apple(),
            pear(),
            ConstructSymbol::flow_tt("assoc"),
            main_response(),
            ConstructSymbol::behavior("act"),
        ],
    )
    .unwrap();

    subsystem.insert(buffer(stimulus(), config)).unwrap();
    subsystem.insert(node(apple(), config)).unwrap();
    subsystem.insert(node(pear(), config)).unwrap();
    subsystem
        .insert(flow(
            ConstructSymbol::flow_tt("assoc"),
            AssociativeMapping::new()
                .with_weight(apple(), pear(), 0.5)
                .with_weight(pear(), apple(), 0.5),
            config,
        ))
        .unwrap();
    subsystem
        .insert(actuator(main_response(), [apple(), pear()], config).unwrap())
        .unwrap();
    subsystem.insert(act).unwrap();
    subsystem
}

/// Fails while the flag is set.
struct Tripwire(Rc<Cell<bool>>);

impl Propagator for Tripwire {
    fn propagate(
        &mut self,
        construct: &ConstructSymbol,
        _inputs: &InputBundle,
    ) -> Result<Packet, PropagatorError> {
        if self.0.get() {
            Err(PropagatorError::PendingInput(construct.clone()))
        } else {
            Ok(ActivationPacket::new().into())
        }
    }
}

fn stimuli() -> Stimuli {
    Stimuli::new().with(
        stimulus(),
        ActivationPacket::new().with(apple(), 1.0).with(pear(), 0.8),
    )
}

fn run(subsystem: &mut ContainerRealizer, passes: usize) -> Vec<Packet> {
    (0..passes)
        .map(|_| Packet::clone(&subsystem.propagate_with(&stimuli()).unwrap()))
        .collect()
}

#[test]
fn test_chain_is_reproducible() {
    let first = run(&mut fruit_subsystem(), 5);
    let second = run(&mut fruit_subsystem(), 5);

    assert_eq!(first, second);
    for packet in &first {
        let composite = packet.as_composite().unwrap();
        let decision = composite.get(&main_response()).unwrap().as_decision().unwrap();
        assert_eq!(decision.chosen().len(), 1);
        assert!((decision.distribution().total() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_decision_reaches_behavior() {
    let mut subsystem = fruit_subsystem();
    let output = subsystem.propagate_with(&stimuli()).unwrap();
    let composite = output.as_composite().unwrap();

    let decision = composite.get(&main_response()).unwrap().as_decision().unwrap();
    let choice = decision.first_choice().unwrap().clone();
    let command = if choice == apple() {
        ConstructSymbol::behavior("eat_apple")
    } else {
        ConstructSymbol::behavior("eat_pear")
    };

    let commands = composite
        .get(&ConstructSymbol::behavior("act"))
        .unwrap()
        .as_activation()
        .unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands.strength(&command), 1.0);
}

#[test]
fn test_clear_activations_reproduces_first_cycle() {
    let mut subsystem = fruit_subsystem();
    assert!(subsystem.ready());

    let first = run(&mut subsystem, 3);
    let links = subsystem.links();

    subsystem.clear_activations();
    assert_eq!(subsystem.links(), links);
    assert!(subsystem.ready());
    assert!(subsystem.children().all(|(_, child)| child.output().is_none()));

    let again = run(&mut subsystem, 3);
    assert_eq!(first, again);
}

#[test]
fn test_recurrent_flow_feeds_next_pass() {
    let mut subsystem = fruit_subsystem();
    run(&mut subsystem, 1);
    let pear_first = subsystem.get(&pear()).unwrap().output().unwrap();
    assert_eq!(pear_first.as_activation().unwrap().strength(&pear()), 0.8);

    run(&mut subsystem, 1);
    let pear_second = subsystem.get(&pear()).unwrap().output().unwrap();
    // max(0.8 from the stimulus, 0.5 * 1.0 from last pass's flow)
    assert_eq!(pear_second.as_activation().unwrap().strength(&pear()), 0.8);

    let apple_second = subsystem.get(&apple()).unwrap().output().unwrap();
    assert_eq!(apple_second.as_activation().unwrap().strength(&apple()), 1.0);
}

#[test]
fn test_ready_cases() {
    let config = config();

    let empty = ContainerRealizer::new(ConstructSymbol::subsystem("empty")).unwrap();
    assert!(empty.ready());

    let mut chain = make_subsystem("chain", [stimulus(), apple()]).unwrap();
    chain.insert(node(apple(), &config)).unwrap();
    assert!(!chain.missing().is_empty());
    assert!(!chain.ready());

    chain.insert(buffer(stimulus(), &config)).unwrap();
    assert!(chain.ready());
}

#[test]
fn test_duplicate_and_unknown_links() {
    let cell = OutputCell::new();
    let mut realizer = node(apple(), &config());

    realizer
        .add_link(stimulus(), cell.puller(LinkTiming::SamePass))
        .unwrap();
    assert!(matches!(
        realizer.add_link(stimulus(), cell.puller(LinkTiming::SamePass)),
        Err(EngineError::DuplicateLink { .. })
    ));
    assert!(matches!(
        realizer.drop_link(&pear()),
        Err(EngineError::UnknownLink { .. })
    ));
}

#[test]
fn test_boltzmann_ties_are_uniform() {
    let strengths = ActivationPacket::new()
        .with(ConstructSymbol::chunk("a"), 2.0)
        .with(ConstructSymbol::chunk("b"), 2.0);
    let mut selector = BoltzmannSelector::new(1.0).unwrap().with_seed(7);

    let trials = 10_000;
    let mut count_a = 0;
    for _ in 0..trials {
        let decision = selector.select(&strengths).unwrap();
        if decision.is_chosen(&ConstructSymbol::chunk("a")) {
            count_a += 1;
        }
    }

    let expected = trials as f64 / 2.0;
    let observed_a = count_a as f64;
    let observed_b = (trials - count_a) as f64;
    let chi_square = (observed_a - expected).powi(2) / expected
        + (observed_b - expected).powi(2) / expected;

    // Critical value for one degree of freedom at p = 0.001.
    assert!(chi_square < 10.83, "chi-square {}", chi_square);
}

#[test]
fn test_boltzmann_low_temperature_is_near_argmax() {
    let a = ConstructSymbol::chunk("a");
    let strengths = ActivationPacket::new()
        .with(a.clone(), 100.0)
        .with(ConstructSymbol::chunk("b"), 0.0);
    let mut selector = BoltzmannSelector::new(0.01).unwrap().with_seed(7);

    assert!(selector.distribution(&strengths).unwrap().strength(&a) >= 0.999);

    let chosen_a = (0..1000)
        .filter(|_| selector.select(&strengths).unwrap().is_chosen(&a))
        .count();
    assert!(chosen_a >= 999);
}

#[test]
fn test_agent_forwards_stimulus_into_subsystem() {
    let config = config();
    let nacs = ConstructSymbol::subsystem("nacs");
    let mut agent = make_agent(
        "alice",
        [stimulus()],
        [Template::new(nacs.clone()).with_members([apple(), main_response()])],
    )
    .unwrap();

    agent.insert(buffer(stimulus(), &config)).unwrap();
    let subsystem = agent.container_mut(&nacs).unwrap();
    subsystem.insert(node(apple(), &config)).unwrap();
    subsystem
        .insert(actuator(main_response(), [apple()], &config).unwrap())
        .unwrap();
    assert!(agent.ready());

    let stimuli = Stimuli::new().with(stimulus(), ActivationPacket::new().with(apple(), 1.0));
    let output = agent.propagate_with(&stimuli).unwrap();

    let nested = output.as_composite().unwrap().get(&nacs).unwrap();
    let decision = nested
        .as_composite()
        .unwrap()
        .get(&main_response())
        .unwrap()
        .as_decision()
        .unwrap();
    assert_eq!(decision.first_choice(), Some(&apple()));

    let snapshot = agent.snapshot().unwrap();
    assert_eq!(
        snapshot["children"]["subsystem:nacs"]["children"]["chunk:APPLE"]["state"],
        "ready"
    );
}

#[test]
fn test_retry_after_failed_pass_matches_clean_run() {
    let config = config();
    let mut clean = fruit_subsystem_with(
        &config,
        ConstructRealizer::new(act(), Tripwire(Rc::new(Cell::new(false)))),
    );
    let expected = run(&mut clean, 4);

    let tripped = Rc::new(Cell::new(false));
    let mut flaky = fruit_subsystem_with(
        &config,
        ConstructRealizer::new(act(), Tripwire(Rc::clone(&tripped))),
    );
    let mut outputs = run(&mut flaky, 2);

    tripped.set(true);
    let before = flaky.capture();
    let result = flaky.propagate_with(&stimuli());
    assert!(matches!(
        result,
        Err(EngineError::Propagation { ref construct, .. }) if *construct == act()
    ));
    assert_eq!(flaky.capture(), before);

    tripped.set(false);
    outputs.extend(run(&mut flaky, 2));
    assert_eq!(outputs, expected);
}

#[test]
fn test_failed_insert_changes_nothing() {
    let acs = ConstructSymbol::subsystem("acs");
    let nacs = ConstructSymbol::subsystem("nacs");
    let mut agent = make_agent(
        "alice",
        [stimulus()],
        [Template::new(acs.clone()), Template::new(nacs.clone())],
    )
    .unwrap();

    let cell = OutputCell::new();
    agent
        .container_mut(&nacs)
        .unwrap()
        .add_link(stimulus(), cell.puller(LinkTiming::SamePass))
        .unwrap();
    let links = agent.links();

    let result = agent.insert(buffer(stimulus(), &config()));
    assert!(matches!(
        result,
        Err(EngineError::DuplicateLink { ref target, .. }) if *target == nacs
    ));
    assert!(!agent.contains(&stimulus()));
    assert!(!agent.container(&acs).unwrap().connector().is_linked(&stimulus()));
    assert_eq!(agent.links(), links);
}

#[test]
fn test_foreign_link_blocks_insert() {
    let cell = OutputCell::new();
    let mut orphan = node(apple(), &config());
    orphan
        .add_link(ConstructSymbol::chunk("GHOST"), cell.puller(LinkTiming::SamePass))
        .unwrap();

    let mut subsystem = make_subsystem("nacs", [apple()]).unwrap();
    assert!(matches!(
        subsystem.insert(orphan),
        Err(EngineError::ForeignLink { .. })
    ));
    assert!(subsystem.links().is_empty());
    assert_eq!(subsystem.missing(), vec![apple()]);
}

#[test]
fn test_removed_realizer_cannot_propagate() {
    let mut subsystem = fruit_subsystem();
    run(&mut subsystem, 1);

    let removed = subsystem.remove(&pear()).unwrap();
    let Realizer::Construct(mut removed) = removed else {
        panic!("pear is a construct realizer");
    };
    assert_eq!(removed.state(), RealizerState::Uninitialized);
    assert!(matches!(removed.propagate(), Err(EngineError::NotWired(_))));
    assert!(subsystem.links().iter().all(|(upstream, target)| *upstream != pear() && *target != pear()));
}

#[test]
fn test_categorical_sampling_follows_log_probabilities() {
    let a = ConstructSymbol::chunk("a");
    let b = ConstructSymbol::chunk("b");
    let never = ConstructSymbol::chunk("never");
    let strengths = ActivationPacket::new()
        .with(a.clone(), 0.2_f64.ln())
        .with(b.clone(), 0.8_f64.ln())
        .with(never.clone(), f64::NEG_INFINITY);
    let mut selector = CategoricalSelector::new().with_seed(9);

    let trials = 10_000;
    let mut count_b = 0;
    for _ in 0..trials {
        let decision = selector.select(&strengths).unwrap();
        assert!(!decision.is_chosen(&never));
        if decision.is_chosen(&b) {
            count_b += 1;
        }
    }

    let share = count_b as f64 / trials as f64;
    assert!((share - 0.8).abs() < 0.03, "share of b {}", share);
}

#[test]
fn test_threshold_keeps_weak_options_out() {
    let config = EngineConfig {
        threshold: Some(0.9),
        ..config()
    };
    let act = eat(&config);
    let mut subsystem = fruit_subsystem_with(&config, act);

    for packet in run(&mut subsystem, 20) {
        let composite = packet.as_composite().unwrap();
        let decision = composite.get(&main_response()).unwrap().as_decision().unwrap();
        assert_eq!(decision.chosen(), &[apple()]);
    }
}

#[test]
fn test_gate_scales_node_inside_container() {
    let config = config();
    let gate = ConstructSymbol::buffer("gate");
    let mut subsystem = make_subsystem("nacs", [stimulus(), gate.clone(), apple()]).unwrap();
    subsystem.insert(buffer(stimulus(), &config)).unwrap();
    subsystem.insert(buffer(gate.clone(), &config)).unwrap();
    subsystem.insert(gated_node(apple(), gate.clone(), &config)).unwrap();
    assert!(subsystem.ready());

    let stimuli = Stimuli::new()
        .with(stimulus(), ActivationPacket::new().with(apple(), 0.8))
        .with(gate, ActivationPacket::new().with(apple(), 0.5));
    subsystem.propagate_with(&stimuli).unwrap();

    let output = subsystem.get(&apple()).unwrap().output().unwrap();
    assert!((output.as_activation().unwrap().strength(&apple()) - 0.4).abs() < 1e-12);
}
