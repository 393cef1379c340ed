//! End-to-end scenarios: synthesis through a stub solver back-end,
//! simulation of the produced controller, products and acceptance
//! validation.

use std::collections::{BTreeMap, BTreeSet};

use gryphon::automaton::{Acceptance, AcceptancePair, AcceptingSets, Automaton};
use gryphon::error::ConsistencyError;
use gryphon::graph::{AttrMap, AttrValue};
use gryphon::machine::{determinize_from_sinit, guided_run, random_run, MachineState};
use gryphon::product::{ba_ts_sync_prod, ts_ba_sync_prod};
use gryphon::solver::{Gr1Solver, RawStrategyGraph};
use gryphon::spec::{GrSpec, Pred, VarDomain};
use gryphon::transys::{Owner, TransitionSystem};
use gryphon::{check_realizable, synthesize, Status};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A canned back-end: refuses specifications whose initial condition
/// is literally false and otherwise returns a fixed alternating
/// strategy over `loc`.
struct StubSolver;

impl StubSolver {
    fn refuses(&self, spec: &GrSpec) -> bool {
        spec.env_init.contains(&Pred::False) || spec.sys_init.contains(&Pred::False)
    }
}

impl Gr1Solver for StubSolver {
    fn synthesize(&self, spec: &GrSpec) -> Option<RawStrategyGraph> {
        if self.refuses(spec) {
            return None;
        }
        let mut strategy = RawStrategyGraph::new();
        let mut green = BTreeMap::new();
        green.insert("loc".to_owned(), 0);
        let mut red = BTreeMap::new();
        red.insert("loc".to_owned(), 1);
        let a = strategy.add_node(green);
        let b = strategy.add_node(red);
        strategy.add_edge(a, b);
        strategy.add_edge(b, a);
        Some(strategy)
    }

    fn check_realizable(&self, spec: &GrSpec) -> bool {
        !self.refuses(spec)
    }
}

fn light_spec() -> GrSpec {
    let mut spec = GrSpec::new();
    spec.sys_vars.insert(
        "loc".to_owned(),
        VarDomain::Enum(vec!["green".to_owned(), "red".to_owned()]),
    );
    spec.sys_init.push(Pred::Eq(
        "loc".to_owned(),
        AttrValue::Str("green".to_owned()),
    ));
    spec.sys_prog.push(Pred::Eq(
        "loc".to_owned(),
        AttrValue::Str("red".to_owned()),
    ));
    spec
}

#[test]
fn traffic_light_controller() {
    init();
    let spec = light_spec();
    let machine = synthesize(&StubSolver, &spec).unwrap().expect("realizable");
    // Sinit plus the two strategy states; Sinit is the sole initial
    // state and reacts once, with the green valuation.
    assert_eq!(machine.num_states(), 3);
    let sinit = machine.state_index(&MachineState::Init).unwrap();
    assert_eq!(machine.initial_states().len(), 1);
    assert!(machine.initial_states().contains(&sinit));
    assert_eq!(machine.graph().out_degree(sinit), 1);
    assert!(machine.is_input_deterministic());

    // Guided run: no input ports, three steps from the inferred start
    // state alternate between the two locations.
    let start = machine.start_state().unwrap();
    assert_eq!(machine.state_id(start), &MachineState::Strategy(0));
    let run = guided_run(&machine, None, 3, &BTreeMap::new()).unwrap();
    let red = machine.state_index(&MachineState::Strategy(1)).unwrap();
    let green = machine.state_index(&MachineState::Strategy(0)).unwrap();
    assert_eq!(run.states, vec![red, green, red]);
    assert_eq!(
        run.outputs["loc"],
        vec![
            AttrValue::Str("red".to_owned()),
            AttrValue::Str("green".to_owned()),
            AttrValue::Str("red".to_owned()),
        ]
    );

    // Guided runs are deterministic.
    let again = guided_run(&machine, None, 3, &BTreeMap::new()).unwrap();
    assert_eq!(run, again);
}

#[test]
fn determinized_initial_reactions() {
    init();
    let spec = light_spec();
    let machine = synthesize(&StubSolver, &spec).unwrap().expect("realizable");
    let det = determinize_from_sinit(&machine, &AttrMap::new());
    let sinit = det.state_index(&MachineState::Init).unwrap();
    // Exactly one edge per distinct input valuation from Sinit.
    let distinct_inputs: BTreeSet<AttrMap> = det
        .transitions(sinit)
        .map(|(_, inputs, _)| inputs)
        .collect();
    assert_eq!(det.graph().out_degree(sinit), distinct_inputs.len());
    assert!(det.is_input_deterministic());
}

#[test]
fn random_run_is_reproducible() {
    init();
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    let machine = synthesize(&StubSolver, &light_spec())
        .unwrap()
        .expect("realizable");
    let mut rng = StdRng::seed_from_u64(42);
    let a = random_run(&machine, None, 8, &mut rng).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let b = random_run(&machine, None, 8, &mut rng).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.states.len(), 8);
}

#[test]
fn unrealizable_spec_returns_none() {
    init();
    let mut spec = light_spec();
    spec.sys_init = vec![Pred::False];
    assert!(synthesize(&StubSolver, &spec).unwrap().is_none());
    assert!(!check_realizable(&StubSolver, &spec));
    assert_eq!(Status::of(false), Status::Unrealizable);
}

#[test]
fn malformed_rabin_acceptance() {
    init();
    let mut ra = Automaton::new(Acceptance::Rabin);
    let q0 = ra.add_state("q0");
    let q1 = ra.add_state("q1");
    // A plain node set where Rabin pairs are required.
    ra.set_accepting_sets(AcceptingSets::Nodes([q0].iter().copied().collect()));
    assert!(matches!(
        ra.check_sanity(),
        Err(ConsistencyError::AcceptanceShape { .. })
    ));
    // The well-formed pair encoding passes.
    ra.set_accepting_sets(AcceptingSets::Pairs(vec![AcceptancePair {
        infinitely_often: [q0].iter().copied().collect(),
        eventually_always_not: [q1].iter().copied().collect(),
    }]));
    assert!(ra.check_sanity().is_ok());
}

fn props(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn synchronous_products() {
    init();
    let mut ts = TransitionSystem::new(Owner::Sys);
    ts.add_atomic_proposition("p");
    let s: Vec<_> = ["s0", "s1", "s2", "s3"]
        .iter()
        .map(|id| ts.add_state(*id))
        .collect();
    ts.set_ap(s[0], props(&["p"])).unwrap();
    for i in 0..4 {
        ts.add_transition(s[i], s[(i + 1) % 4], AttrMap::new())
            .unwrap();
    }
    ts.mark_initial(s[0]);
    ts.mark_initial(s[1]);

    let mut ba = Automaton::new(Acceptance::Buchi);
    ba.add_atomic_proposition("p");
    let q0 = ba.add_state("q0");
    let q1 = ba.add_state("q1");
    ba.mark_initial(q0);
    ba.mark_accepting(q1);
    ba.add_guarded_edge(q0, q1, props(&["p"])).unwrap();
    ba.add_guarded_edge(q0, q0, props(&[])).unwrap();
    ba.add_guarded_edge(q1, q0, props(&[])).unwrap();
    ba.add_guarded_edge(q1, q1, props(&["p"])).unwrap();

    let prod = ba_ts_sync_prod(&ba, &ts).unwrap();
    let ids: BTreeSet<_> = prod
        .graph()
        .node_indices()
        .map(|u| *prod.graph().node_id(u))
        .collect();
    assert_eq!(
        ids,
        [("s0", "q1"), ("s1", "q0"), ("s2", "q0"), ("s3", "q0")]
            .iter()
            .copied()
            .collect()
    );

    let (prod_ts, persistent) = ts_ba_sync_prod(&ts, &ba).unwrap();
    assert_eq!(prod_ts.graph().num_nodes(), 4);
    assert_eq!(persistent, [("s0", "q1")].iter().copied().collect());
}
