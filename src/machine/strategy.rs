//! Conversion of solver strategies into executable Mealy machines.
//!
//! Every strategy node becomes a machine state; a strategy edge u→v is
//! labeled with v's full variable valuation, decoded from the solver's
//! integer coding. A synthetic `Sinit` state reacts once per distinct
//! valuation satisfying the specification's initial condition.

use std::collections::BTreeSet;
use std::hash::Hash;

use log::{debug, info};

use crate::error::{ConstructionError, Error, SynthesisFailure};
use crate::graph::{AttrMap, NodeIndex};
use crate::machine::{create_ports, project, MachineState, MealyMachine};
use crate::solver::RawStrategyGraph;
use crate::spec::GrSpec;

fn decode_state(
    strategy: &RawStrategyGraph,
    node: usize,
    spec: &GrSpec,
) -> Result<AttrMap, ConstructionError> {
    let mut valuation = AttrMap::new();
    for (name, domain) in spec.env_vars.iter().chain(spec.sys_vars.iter()) {
        let code = strategy
            .state(node)
            .get(name)
            .ok_or_else(|| ConstructionError::StateMissingVar {
                node,
                var: name.clone(),
            })?;
        let value = domain
            .decode(*code)
            .ok_or_else(|| ConstructionError::StateOutOfDomain {
                node,
                var: name.clone(),
                value: *code,
            })?;
        valuation.insert(name.clone(), value);
    }
    Ok(valuation)
}

/// Convert a non-empty strategy graph into a Mealy machine.
///
/// Input ports come from the environment variables, output ports from
/// the system variables. The machine's sole initial state is `Sinit`;
/// it has one outgoing edge per distinct valuation (among the strategy
/// nodes) that satisfies the compiled initial condition. A strategy
/// none of whose nodes satisfies its own initial condition is a fatal
/// construction defect and is reported with a full dump.
pub fn strategy_to_mealy(
    strategy: &RawStrategyGraph,
    spec: &GrSpec,
) -> Result<MealyMachine<MachineState>, Error> {
    if strategy.is_empty() {
        return Err(SynthesisFailure.into());
    }
    info!(
        "converting strategy with {} node(s) to a Mealy machine",
        strategy.num_nodes()
    );

    let mut machine = MealyMachine::new();
    for (name, domain) in create_ports(&spec.env_vars) {
        machine.add_input(&name, domain);
    }
    for (name, domain) in create_ports(&spec.sys_vars) {
        machine.add_output(&name, domain);
    }

    let mut decoded = Vec::with_capacity(strategy.num_nodes());
    for node in 0..strategy.num_nodes() {
        decoded.push(decode_state(strategy, node, spec)?);
    }
    // Strategy nodes keep their indices; Sinit comes last.
    for node in 0..strategy.num_nodes() {
        machine.add_state(MachineState::Strategy(node));
    }
    for (u, v) in strategy.edges() {
        machine
            .add_transition(u, v, decoded[v].clone())
            .map_err(Error::Domain)?;
    }

    let sinit = machine.add_state(MachineState::Init);
    machine.mark_initial(sinit);
    let init = spec.compile_init();
    let mut seen: BTreeSet<AttrMap> = BTreeSet::new();
    for node in 0..strategy.num_nodes() {
        let valuation = &decoded[node];
        if seen.contains(valuation) {
            continue;
        }
        if !init.satisfied_by(valuation) {
            continue;
        }
        machine
            .add_transition(sinit, node, valuation.clone())
            .map_err(Error::Domain)?;
        seen.insert(valuation.clone());
    }
    if machine.graph().out_degree(sinit) == 0 {
        return Err(ConstructionError::NoInitialReaction {
            strategy: strategy.to_string(),
            machine: machine.to_string(),
        }
        .into());
    }
    debug!(
        "Sinit has {} initial reaction(s)",
        machine.graph().out_degree(sinit)
    );
    Ok(machine)
}

/// Resolve initial non-determinism from the initial states of `mealy`.
///
/// The first pass drops every initial out-edge whose label disagrees
/// with a value fixed in `init_out_values` (ports not mentioned there
/// are unconstrained). The second pass keeps, per distinct input-port
/// valuation, only the first remaining edge in edge order. Afterwards
/// the initial states have at most one out-edge per input valuation.
pub fn determinize_from_sinit<N>(
    mealy: &MealyMachine<N>,
    init_out_values: &AttrMap,
) -> MealyMachine<N>
where
    N: Clone + Eq + Hash + Ord,
{
    let mut machine = mealy.clone();
    let given = project(init_out_values, machine.outputs());
    let inputs = machine.inputs().clone();
    let initial: Vec<NodeIndex> = machine.initial_states().iter().copied().collect();
    for init in initial {
        let before = machine.graph().out_degree(init);
        machine.graph_mut().retain_out_edges(init, |_, _, attrs| {
            given
                .iter()
                .all(|(name, value)| attrs.get(name).map_or(true, |v| v == value))
        });
        let mut seen: BTreeSet<AttrMap> = BTreeSet::new();
        machine
            .graph_mut()
            .retain_out_edges(init, |_, _, attrs| seen.insert(project(attrs, &inputs)));
        debug!(
            "determinized initial state: {} of {} reaction(s) kept",
            machine.graph().out_degree(init),
            before
        );
    }
    machine
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::error::{ConstructionError, Error};
    use crate::graph::AttrValue;
    use crate::spec::{Pred, VarDomain};

    fn light_spec() -> GrSpec {
        let mut spec = GrSpec::new();
        spec.env_vars.insert("up".to_owned(), VarDomain::Boolean);
        spec.sys_vars.insert(
            "loc".to_owned(),
            VarDomain::Enum(vec!["red".to_owned(), "green".to_owned()]),
        );
        spec.sys_init.push(Pred::Eq(
            "loc".to_owned(),
            AttrValue::Str("red".to_owned()),
        ));
        spec
    }

    fn coded(up: i64, loc: i64) -> BTreeMap<String, i64> {
        let mut state = BTreeMap::new();
        state.insert("up".to_owned(), up);
        state.insert("loc".to_owned(), loc);
        state
    }

    fn light_strategy() -> RawStrategyGraph {
        let mut strategy = RawStrategyGraph::new();
        let a = strategy.add_node(coded(0, 0)); // red
        let b = strategy.add_node(coded(1, 1)); // green
        let c = strategy.add_node(coded(1, 0)); // red again
        strategy.add_edge(a, b);
        strategy.add_edge(b, c);
        strategy.add_edge(c, b);
        strategy
    }

    #[test]
    fn test_strategy_conversion() {
        let spec = light_spec();
        let machine = strategy_to_mealy(&light_strategy(), &spec).unwrap();
        // Three strategy states plus Sinit.
        assert_eq!(machine.num_states(), 4);
        let sinit = machine.state_index(&MachineState::Init).unwrap();
        assert_eq!(machine.initial_states().iter().copied().collect::<Vec<_>>(), vec![sinit]);
        // Both red-valued nodes satisfy the initial condition, but they
        // differ on `up`, so both reactions survive deduplication.
        assert_eq!(machine.graph().out_degree(sinit), 2);
        // Edge labels carry the decoded target valuation.
        let b = machine.state_index(&MachineState::Strategy(1)).unwrap();
        let (_, outputs) = machine
            .reaction(b, &{
                let mut i = AttrMap::new();
                i.insert("up".to_owned(), AttrValue::Int(1));
                i
            })
            .unwrap();
        assert_eq!(
            outputs.get("loc"),
            Some(&AttrValue::Str("red".to_owned()))
        );
    }

    #[test]
    fn test_duplicate_valuations_collapse() {
        let spec = light_spec();
        let mut strategy = light_strategy();
        // A second node with the same valuation as node 0 must not add
        // a second identical initial reaction.
        let d = strategy.add_node(coded(0, 0));
        strategy.add_edge(d, 1);
        let machine = strategy_to_mealy(&strategy, &spec).unwrap();
        let sinit = machine.state_index(&MachineState::Init).unwrap();
        assert_eq!(machine.graph().out_degree(sinit), 2);
    }

    #[test]
    fn test_empty_strategy() {
        let err = strategy_to_mealy(&RawStrategyGraph::new(), &light_spec()).unwrap_err();
        assert!(matches!(err, Error::Synthesis(_)));
    }

    #[test]
    fn test_no_initial_reaction_is_fatal() {
        let mut spec = light_spec();
        spec.sys_init = vec![Pred::False];
        let err = strategy_to_mealy(&light_strategy(), &spec).unwrap_err();
        match err {
            Error::Construction(ConstructionError::NoInitialReaction { strategy, machine }) => {
                // The dump names the strategy nodes and the ports.
                assert!(strategy.contains("loc"));
                assert!(machine.contains("Sinit"));
            }
            other => panic!("expected construction error, got {}", other),
        }
    }

    #[test]
    fn test_bad_valuation_code() {
        let spec = light_spec();
        let mut strategy = RawStrategyGraph::new();
        let a = strategy.add_node(coded(0, 5));
        strategy.add_edge(a, a);
        let err = strategy_to_mealy(&strategy, &spec).unwrap_err();
        assert!(matches!(
            err,
            Error::Construction(ConstructionError::StateOutOfDomain { .. })
        ));
    }

    #[test]
    fn test_determinize_from_sinit() {
        let spec = light_spec();
        let machine = strategy_to_mealy(&light_strategy(), &spec).unwrap();
        let sinit = machine.state_index(&MachineState::Init).unwrap();
        assert_eq!(machine.graph().out_degree(sinit), 2);

        // Pinning `up = 0` leaves the single agreeing reaction.
        let mut given = AttrMap::new();
        given.insert("up".to_owned(), AttrValue::Int(0));
        // `up` is an input, not an output; pinning it has no effect in
        // the first pass, but the second pass separates by input.
        let det = determinize_from_sinit(&machine, &given);
        let per_input: BTreeSet<AttrMap> = det
            .transitions(sinit)
            .map(|(_, inputs, _)| inputs)
            .collect();
        assert_eq!(det.graph().out_degree(sinit), per_input.len());

        // Pinning the output to green removes the red reactions and
        // leaves Sinit with no edges at all, since every initial
        // reaction was red.
        let mut green = AttrMap::new();
        green.insert("loc".to_owned(), AttrValue::Str("green".to_owned()));
        let det = determinize_from_sinit(&machine, &green);
        assert_eq!(det.graph().out_degree(sinit), 0);
    }
}
