//! Conversions between Moore and Mealy machines.
//!
//! Moore→Mealy is exact: the source state's output is copied onto every
//! outgoing edge. Mealy→Moore is an approximation, because a Moore
//! machine must emit an output before the first input is read; that
//! first output is a modeling choice and is a required parameter here.

use std::collections::{BTreeSet, VecDeque};
use std::hash::Hash;

use log::info;

use crate::error::DomainError;
use crate::graph::{AttrMap, NodeIndex};
use crate::machine::{is_valuation, project, MealyMachine, MooreMachine};

/// Convert a Moore machine to the Mealy machine producing the same
/// output sequences: each state's output valuation is copied onto all
/// of its outgoing edges.
pub fn moore_to_mealy<N>(moore: &MooreMachine<N>) -> MealyMachine<N>
where
    N: Clone + Eq + Hash + Ord,
{
    let mut mealy = MealyMachine::new();
    for (name, domain) in moore.inputs() {
        mealy.add_input(name, domain.clone());
    }
    for (name, domain) in moore.outputs() {
        mealy.add_output(name, domain.clone());
    }
    for u in moore.graph().node_indices() {
        mealy.add_state(moore.state_id(u).clone());
    }
    for &u in moore.initial_states() {
        mealy.mark_initial(u);
    }
    for (u, v, attrs) in moore.graph().edges() {
        let mut label = project(attrs, mealy.inputs());
        label.extend(moore.output(u));
        // Labels were validated against the same domains in the source.
        mealy
            .add_transition(u, v, label)
            .unwrap_or_else(|_| unreachable!());
    }
    mealy
}

/// A Moore state produced by [`mealy_to_moore`]: the underlying Mealy
/// state id paired with the output valuation the state emits.
pub type SplitState<N> = (N, AttrMap);

/// Approximate a Mealy machine by a Moore machine.
///
/// Breadth-first traversal from the Mealy initial states splits each
/// state per distinct incoming output valuation; identical
/// (state, output) pairs are merged. `initial_output` is the output
/// the Moore machine emits before the first input and must be a
/// complete valuation of the output ports.
pub fn mealy_to_moore<N>(
    mealy: &MealyMachine<N>,
    initial_output: &AttrMap,
) -> Result<MooreMachine<SplitState<N>>, DomainError>
where
    N: Clone + Eq + Hash + Ord,
{
    is_valuation(mealy.outputs(), initial_output)?;
    let initial_output = project(initial_output, mealy.outputs());

    let mut moore = MooreMachine::new();
    for (name, domain) in mealy.inputs() {
        moore.add_input(name, domain.clone());
    }
    for (name, domain) in mealy.outputs() {
        moore.add_output(name, domain.clone());
    }

    let mut queue: VecDeque<(NodeIndex, NodeIndex)> = VecDeque::new();
    let mut visited: BTreeSet<NodeIndex> = BTreeSet::new();
    for &u in mealy.initial_states() {
        let id = (mealy.state_id(u).clone(), initial_output.clone());
        let node = moore.add_state(id, &initial_output)?;
        moore.mark_initial(node);
        queue.push_back((u, node));
        visited.insert(node);
    }
    while let Some((u, split)) = queue.pop_front() {
        for (v, inputs, outputs) in mealy.transitions(u) {
            let id = (mealy.state_id(v).clone(), outputs.clone());
            let next = moore.add_state(id, &outputs)?;
            moore.add_transition(split, next, inputs)?;
            if visited.insert(next) {
                queue.push_back((v, next));
            }
        }
    }
    info!(
        "split {} Mealy state(s) into {} Moore state(s)",
        mealy.num_states(),
        moore.num_states()
    );
    Ok(moore)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::graph::{AttrValue, Domain};
    use crate::machine::simulate::guided_run;

    fn bool_domain() -> Domain {
        Domain::Explicit([AttrValue::Int(0), AttrValue::Int(1)].iter().cloned().collect())
    }

    fn out(v: i64) -> AttrMap {
        let mut m = AttrMap::new();
        m.insert("go".to_owned(), AttrValue::Int(v));
        m
    }

    fn light_moore() -> MooreMachine<&'static str> {
        let mut m = MooreMachine::new();
        m.add_output("go", bool_domain());
        let green = m.add_state("green", &out(1)).unwrap();
        let red = m.add_state("red", &out(0)).unwrap();
        m.add_transition(green, red, AttrMap::new()).unwrap();
        m.add_transition(red, green, AttrMap::new()).unwrap();
        m.mark_initial(green);
        m
    }

    #[test]
    fn test_moore_to_mealy_outputs() {
        let moore = light_moore();
        let mealy = moore_to_mealy(&moore);
        assert_eq!(mealy.num_states(), 2);
        let green = mealy.state_index(&"green").unwrap();
        let red = mealy.state_index(&"red").unwrap();
        // Outputs along any run equal the Moore outputs of the source
        // states of the traversed edges.
        let run = guided_run(&mealy, Some(green), 4, &BTreeMap::new()).unwrap();
        assert_eq!(run.states, vec![red, green, red, green]);
        assert_eq!(
            run.outputs["go"],
            vec![
                AttrValue::Int(1),
                AttrValue::Int(0),
                AttrValue::Int(1),
                AttrValue::Int(0),
            ]
        );
    }

    #[test]
    fn test_mealy_to_moore_splits_states() {
        let mut mealy: MealyMachine<&str> = MealyMachine::new();
        mealy.add_output("go", bool_domain());
        let green = mealy.add_state("green");
        let red = mealy.add_state("red");
        mealy.add_transition(green, red, out(0)).unwrap();
        mealy.add_transition(red, green, out(1)).unwrap();
        mealy.mark_initial(green);

        let moore = mealy_to_moore(&mealy, &out(0)).unwrap();
        // `green` appears twice: once with the placeholder initial
        // output and once with the output produced on entry.
        assert_eq!(moore.num_states(), 3);
        assert_eq!(moore.initial_states().len(), 1);
        let &init = moore.initial_states().iter().next().unwrap();
        assert_eq!(moore.state_id(init), &("green", out(0)));
        assert_eq!(moore.output(init), out(0));
        // Re-entering an already split state merges.
        let reentry = moore.graph().index_of(&("red", out(0))).unwrap();
        assert_eq!(
            moore.graph().successors(reentry).count(),
            1
        );
    }

    #[test]
    fn test_mealy_to_moore_requires_complete_output() {
        let mut mealy: MealyMachine<&str> = MealyMachine::new();
        mealy.add_output("go", bool_domain());
        let green = mealy.add_state("green");
        mealy.add_transition(green, green, out(1)).unwrap();
        mealy.mark_initial(green);
        let err = mealy_to_moore(&mealy, &AttrMap::new()).unwrap_err();
        assert_eq!(
            err,
            DomainError::IncompleteValuation {
                name: "go".to_owned()
            }
        );
    }
}
