//! Driving a Mealy machine: guided, random and interactive runs.
//!
//! A guided run follows caller-supplied input sequences through the
//! deterministic reaction. A random run models an arbitrary but
//! non-blocking environment with a caller-seeded RNG. An interactive
//! run suspends at an explicit choice point instead of reading input
//! inside the loop.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use log::debug;
use rand::Rng;

use crate::error::SelectionError;
use crate::graph::{AttrMap, AttrValue, NodeIndex};
use crate::machine::{project, MealyMachine};

/// The trace of a run: the visited states (excluding the start state)
/// and, per output port, the produced value sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub states: Vec<NodeIndex>,
    pub outputs: BTreeMap<String, Vec<AttrValue>>,
}

impl Run {
    fn new<N: Clone + Eq + Hash + Ord>(mealy: &MealyMachine<N>) -> Self {
        Run {
            states: Vec::new(),
            outputs: mealy
                .outputs()
                .keys()
                .map(|name| (name.clone(), Vec::new()))
                .collect(),
        }
    }

    fn record(&mut self, state: NodeIndex, output: &AttrMap) {
        self.states.push(state);
        for (name, seq) in &mut self.outputs {
            if let Some(value) = output.get(name) {
                seq.push(value.clone());
            }
        }
    }
}

fn check_output_complete<N>(
    mealy: &MealyMachine<N>,
    from: NodeIndex,
    output: &AttrMap,
) -> Result<(), SelectionError>
where
    N: Clone + Eq + Hash + Ord + fmt::Display,
{
    for name in mealy.outputs().keys() {
        if !output.contains_key(name) {
            return Err(SelectionError::MissingOutput {
                state: mealy.state_id(from).to_string(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}

fn resolve_start<N>(
    mealy: &MealyMachine<N>,
    from_state: Option<NodeIndex>,
) -> Result<NodeIndex, SelectionError>
where
    N: Clone + Eq + Hash + Ord + fmt::Display,
{
    match from_state {
        Some(state) => Ok(state),
        None => mealy.start_state(),
    }
}

/// Run the machine for `steps` steps along the given input sequences.
///
/// Every declared input port needs a sequence of exactly `steps`
/// values; a missing port or a length mismatch is a configuration
/// error, never a silent truncation. Without `from_state` the run
/// starts at the machine's inferred start state. Taking a transition
/// whose label omits an output port fails the run rather than
/// producing ragged output sequences.
pub fn guided_run<N>(
    mealy: &MealyMachine<N>,
    from_state: Option<NodeIndex>,
    steps: usize,
    input_sequences: &BTreeMap<String, Vec<AttrValue>>,
) -> Result<Run, SelectionError>
where
    N: Clone + Eq + Hash + Ord + fmt::Display,
{
    let missing: Vec<String> = mealy
        .inputs()
        .keys()
        .filter(|name| !input_sequences.contains_key(*name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(SelectionError::MissingPorts(missing));
    }
    for (name, seq) in input_sequences {
        if mealy.inputs().contains_key(name) && seq.len() != steps {
            return Err(SelectionError::SequenceLength {
                name: name.clone(),
                len: seq.len(),
                expected: steps,
            });
        }
    }
    let mut state = resolve_start(mealy, from_state)?;
    debug!("guided run from {} for {} step(s)", mealy.state_id(state), steps);
    let mut run = Run::new(mealy);
    for t in 0..steps {
        let input: AttrMap = mealy
            .inputs()
            .keys()
            .map(|name| (name.clone(), input_sequences[name][t].clone()))
            .collect();
        let (next, output) = mealy.reaction(state, &input)?;
        check_output_complete(mealy, state, &output)?;
        run.record(next, &output);
        state = next;
    }
    Ok(run)
}

/// Run the machine for `steps` steps, at each state taking one of the
/// outgoing edges uniformly at random.
///
/// Reachable states of a converted strategy always have a successor;
/// hitting a state without one means the machine was not produced by
/// that pipeline, and the run fails rather than blocking.
pub fn random_run<N, R>(
    mealy: &MealyMachine<N>,
    from_state: Option<NodeIndex>,
    steps: usize,
    rng: &mut R,
) -> Result<Run, SelectionError>
where
    N: Clone + Eq + Hash + Ord + fmt::Display,
    R: Rng + ?Sized,
{
    let mut state = resolve_start(mealy, from_state)?;
    debug!("random run from {} for {} step(s)", mealy.state_id(state), steps);
    let mut run = Run::new(mealy);
    for _ in 0..steps {
        let degree = mealy.graph().out_degree(state);
        if degree == 0 {
            return Err(SelectionError::NoMatch {
                state: mealy.state_id(state).to_string(),
            });
        }
        let pick = rng.gen_range(0..degree);
        let (next, attrs) = mealy
            .graph()
            .out_edges(state)
            .nth(pick)
            .unwrap_or_else(|| unreachable!());
        let output = project(attrs, mealy.outputs());
        check_output_complete(mealy, state, &output)?;
        run.record(next, &output);
        state = next;
    }
    Ok(run)
}

/// One enabled transition offered by an interactive run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub to: NodeIndex,
    pub inputs: AttrMap,
    pub outputs: AttrMap,
}

/// A stepping loop with an explicit suspension point: the caller asks
/// for the enabled transitions with [`offer`], picks one with
/// [`choose`], and stops whenever it likes. The run is over when no
/// transition is enabled.
///
/// [`offer`]: InteractiveRun::offer
/// [`choose`]: InteractiveRun::choose
#[derive(Debug)]
pub struct InteractiveRun<'a, N> {
    machine: &'a MealyMachine<N>,
    state: NodeIndex,
}

impl<'a, N: Clone + Eq + Hash + Ord + fmt::Display> InteractiveRun<'a, N> {
    pub fn new(
        machine: &'a MealyMachine<N>,
        from_state: Option<NodeIndex>,
    ) -> Result<Self, SelectionError> {
        let state = resolve_start(machine, from_state)?;
        Ok(InteractiveRun { machine, state })
    }

    pub fn current_state(&self) -> NodeIndex {
        self.state
    }

    /// The transitions enabled at the current state, in edge order.
    pub fn offer(&self) -> Vec<Choice> {
        self.machine
            .transitions(self.state)
            .map(|(to, inputs, outputs)| Choice { to, inputs, outputs })
            .collect()
    }

    pub fn is_done(&self) -> bool {
        self.machine.graph().out_degree(self.state) == 0
    }

    /// Apply the `index`-th offered transition and advance.
    pub fn choose(&mut self, index: usize) -> Result<Choice, SelectionError> {
        let choices = self.offer();
        let available = choices.len();
        let choice = choices
            .into_iter()
            .nth(index)
            .ok_or(SelectionError::BadChoice { index, available })?;
        self.state = choice.to;
        Ok(choice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::graph::Domain;

    fn bool_domain() -> Domain {
        Domain::Explicit([AttrValue::Int(0), AttrValue::Int(1)].iter().cloned().collect())
    }

    /// Two states, no inputs, one boolean output `go`.
    fn traffic_light() -> MealyMachine<&'static str> {
        let mut m = MealyMachine::new();
        m.add_output("go", bool_domain());
        let green = m.add_state("green");
        let red = m.add_state("red");
        let mut stop = AttrMap::new();
        stop.insert("go".to_owned(), AttrValue::Int(0));
        let mut go = AttrMap::new();
        go.insert("go".to_owned(), AttrValue::Int(1));
        m.add_transition(green, red, stop).unwrap();
        m.add_transition(red, green, go).unwrap();
        m
    }

    #[test]
    fn test_guided_run_traffic_light() {
        let m = traffic_light();
        let green = m.state_index(&"green").unwrap();
        let red = m.state_index(&"red").unwrap();
        let run = guided_run(&m, Some(green), 3, &BTreeMap::new()).unwrap();
        assert_eq!(run.states, vec![red, green, red]);
        assert_eq!(
            run.outputs["go"],
            vec![AttrValue::Int(0), AttrValue::Int(1), AttrValue::Int(0)]
        );
    }

    #[test]
    fn test_guided_run_deterministic() {
        let m = traffic_light();
        let green = m.state_index(&"green").unwrap();
        let a = guided_run(&m, Some(green), 5, &BTreeMap::new()).unwrap();
        let b = guided_run(&m, Some(green), 5, &BTreeMap::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_guided_run_missing_port() {
        let mut m = traffic_light();
        m.add_input("up", bool_domain());
        let green = m.state_index(&"green").unwrap();
        let err = guided_run(&m, Some(green), 1, &BTreeMap::new()).unwrap_err();
        assert_eq!(err, SelectionError::MissingPorts(vec!["up".to_owned()]));
    }

    #[test]
    fn test_guided_run_length_mismatch() {
        let mut m = traffic_light();
        m.add_input("up", bool_domain());
        let green = m.state_index(&"green").unwrap();
        let mut seqs = BTreeMap::new();
        seqs.insert("up".to_owned(), vec![AttrValue::Int(0), AttrValue::Int(1)]);
        let err = guided_run(&m, Some(green), 3, &seqs).unwrap_err();
        assert!(matches!(err, SelectionError::SequenceLength { .. }));
    }

    #[test]
    fn test_run_fails_on_missing_output() {
        // A hand-built machine with an edge that omits the `go` port.
        let mut m: MealyMachine<&str> = MealyMachine::new();
        m.add_output("go", bool_domain());
        let a = m.add_state("a");
        m.add_transition(a, a, AttrMap::new()).unwrap();
        let err = guided_run(&m, Some(a), 1, &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            SelectionError::MissingOutput {
                state: "a".to_owned(),
                name: "go".to_owned(),
            }
        );
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            random_run(&m, Some(a), 1, &mut rng),
            Err(SelectionError::MissingOutput { .. })
        ));
    }

    #[test]
    fn test_random_run_reproducible() {
        let m = traffic_light();
        let green = m.state_index(&"green").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let a = random_run(&m, Some(green), 10, &mut rng).unwrap();
        assert_eq!(a.states.len(), 10);
        assert_eq!(a.outputs["go"].len(), 10);
        let mut rng = StdRng::seed_from_u64(7);
        let b = random_run(&m, Some(green), 10, &mut rng).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_run_deadend_fails() {
        let mut m: MealyMachine<&str> = MealyMachine::new();
        let a = m.add_state("a");
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            random_run(&m, Some(a), 1, &mut rng),
            Err(SelectionError::NoMatch { .. })
        ));
    }

    #[test]
    fn test_interactive_run() {
        let m = traffic_light();
        let green = m.state_index(&"green").unwrap();
        let red = m.state_index(&"red").unwrap();
        let mut run = InteractiveRun::new(&m, Some(green)).unwrap();
        assert!(!run.is_done());
        let offered = run.offer();
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].to, red);
        assert!(matches!(
            run.choose(3),
            Err(SelectionError::BadChoice { index: 3, available: 1 })
        ));
        let taken = run.choose(0).unwrap();
        assert_eq!(taken.outputs.get("go"), Some(&AttrValue::Int(0)));
        assert_eq!(run.current_state(), red);
    }
}
