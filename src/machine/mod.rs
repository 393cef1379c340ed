//! Mealy and Moore transducers.
//!
//! A machine is a labeled graph with typed input/output ports. Mealy
//! edges carry a full input and output valuation; Moore nodes carry the
//! output valuation and edges the input one. The conversion from a
//! solver strategy lives in [`strategy`], the simulation engine in
//! [`simulate`] and the Moore⇄Mealy conversions in [`convert`].

pub mod convert;
pub mod simulate;
pub mod strategy;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::Hash;

use crate::error::{ConsistencyError, DomainError, SelectionError};
use crate::graph::{AttrMap, Domain, LabeledGraph, NodeIndex};
use crate::spec::VarDomain;

pub use self::convert::{mealy_to_moore, moore_to_mealy, SplitState};
pub use self::simulate::{guided_run, random_run, Choice, InteractiveRun, Run};
pub use self::strategy::{determinize_from_sinit, strategy_to_mealy};

/// State identity of a machine produced by strategy conversion: the
/// synthetic initial state plus one state per strategy node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MachineState {
    Init,
    Strategy(usize),
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MachineState::Init => write!(f, "Sinit"),
            MachineState::Strategy(i) => write!(f, "s{}", i),
        }
    }
}

/// Build port domains from specification variable domains: boolean
/// variables become `{0, 1}` ports, ranges integer-set ports and
/// enumerations string-set ports.
pub fn create_ports(vars: &BTreeMap<String, VarDomain>) -> BTreeMap<String, Domain> {
    vars.iter()
        .map(|(name, domain)| (name.clone(), domain.to_port_domain()))
        .collect()
}

/// The entries of `attrs` whose key is one of `ports`.
pub(crate) fn project(attrs: &AttrMap, ports: &BTreeMap<String, Domain>) -> AttrMap {
    attrs
        .iter()
        .filter(|(name, _)| ports.contains_key(*name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Check that `valuation` assigns every port a value in its domain.
/// Entries for unknown names are ignored.
pub(crate) fn is_valuation(
    ports: &BTreeMap<String, Domain>,
    valuation: &AttrMap,
) -> Result<(), DomainError> {
    for (name, domain) in ports {
        let value = valuation
            .get(name)
            .ok_or_else(|| DomainError::IncompleteValuation { name: name.clone() })?;
        if !domain.contains(value) {
            return Err(DomainError::OutOfDomain {
                name: name.clone(),
                value: value.to_string(),
                domain: domain.to_string(),
            });
        }
    }
    Ok(())
}

/// A Mealy machine: inputs and outputs are read and produced on edges.
#[derive(Debug, Clone)]
pub struct MealyMachine<N> {
    graph: LabeledGraph<N>,
    inputs: BTreeMap<String, Domain>,
    outputs: BTreeMap<String, Domain>,
    state_vars: BTreeMap<String, Domain>,
}

impl<N: Clone + Eq + Hash + Ord> MealyMachine<N> {
    pub fn new() -> Self {
        MealyMachine {
            graph: LabeledGraph::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            state_vars: BTreeMap::new(),
        }
    }

    pub fn add_input(&mut self, name: &str, domain: Domain) {
        self.graph.declare_edge_attr(name, domain.clone(), None);
        self.inputs.insert(name.to_owned(), domain);
    }

    pub fn add_output(&mut self, name: &str, domain: Domain) {
        self.graph.declare_edge_attr(name, domain.clone(), None);
        self.outputs.insert(name.to_owned(), domain);
    }

    /// Declare a variable carried on machine states.
    pub fn add_state_var(&mut self, name: &str, domain: Domain) {
        self.graph.declare_node_attr(name, domain.clone(), None);
        self.state_vars.insert(name.to_owned(), domain);
    }

    pub fn inputs(&self) -> &BTreeMap<String, Domain> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<String, Domain> {
        &self.outputs
    }

    pub fn graph(&self) -> &LabeledGraph<N> {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut LabeledGraph<N> {
        &mut self.graph
    }

    pub fn num_states(&self) -> usize {
        self.graph.num_nodes()
    }

    pub fn add_state(&mut self, id: N) -> NodeIndex {
        self.graph.add_node(id)
    }

    pub fn mark_initial(&mut self, node: NodeIndex) {
        self.graph.mark_initial(node);
    }

    pub fn initial_states(&self) -> &BTreeSet<NodeIndex> {
        self.graph.initial_nodes()
    }

    pub fn state_id(&self, node: NodeIndex) -> &N {
        self.graph.node_id(node)
    }

    pub fn state_index(&self, id: &N) -> Option<NodeIndex> {
        self.graph.index_of(id)
    }

    /// Add a transition labeled with a (partial) input/output valuation.
    /// Labels are validated against the port domains.
    pub fn add_transition(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        label: AttrMap,
    ) -> Result<(), DomainError> {
        self.graph.add_edge(from, to, label)
    }

    /// Out-transitions as `(target, input valuation, output valuation)`.
    pub fn transitions(
        &self,
        state: NodeIndex,
    ) -> impl Iterator<Item = (NodeIndex, AttrMap, AttrMap)> + '_ {
        self.graph.out_edges(state).map(move |(to, attrs)| {
            (to, project(attrs, &self.inputs), project(attrs, &self.outputs))
        })
    }

    pub fn remove_deadends(&mut self) {
        self.graph.remove_deadends();
    }

    /// True when no state has two outgoing edges with the same
    /// input-port valuation.
    pub fn is_input_deterministic(&self) -> bool {
        self.graph.node_indices().all(|u| {
            let mut seen = BTreeSet::new();
            self.graph
                .out_edges(u)
                .all(|(_, attrs)| seen.insert(project(attrs, &self.inputs)))
        })
    }
}

impl<N: Clone + Eq + Hash + Ord + fmt::Display> MealyMachine<N> {
    /// Fail with the offending state when the machine is not
    /// input-deterministic.
    pub fn check_determinism(&self) -> Result<(), ConsistencyError> {
        for u in self.graph.node_indices() {
            let mut seen = BTreeSet::new();
            for (_, attrs) in self.graph.out_edges(u) {
                if !seen.insert(project(attrs, &self.inputs)) {
                    return Err(ConsistencyError::NonDeterministic {
                        state: self.graph.node_id(u).to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Perform one step: among the out-edges of `state`, exactly one
    /// must match the input valuation; return its target and output
    /// valuation. Zero or multiple matches violate the
    /// input-determinism contract and fail loudly.
    pub fn reaction(
        &self,
        state: NodeIndex,
        input_values: &AttrMap,
    ) -> Result<(NodeIndex, AttrMap), SelectionError> {
        let want = project(input_values, &self.inputs);
        let mut found = None;
        for (to, attrs) in self.graph.out_edges(state) {
            if project(attrs, &self.inputs) != want {
                continue;
            }
            if found.is_some() {
                return Err(SelectionError::Ambiguous {
                    state: self.graph.node_id(state).to_string(),
                });
            }
            found = Some((to, project(attrs, &self.outputs)));
        }
        found.ok_or_else(|| SelectionError::NoMatch {
            state: self.graph.node_id(state).to_string(),
        })
    }

    /// The default simulation start state: the sole distinct successor
    /// of the sole initial state. Anything else is ambiguous and the
    /// caller must pick explicitly.
    pub fn start_state(&self) -> Result<NodeIndex, SelectionError> {
        let initial = self.graph.initial_nodes();
        if initial.len() != 1 {
            return Err(SelectionError::AmbiguousStart {
                count: initial.len(),
            });
        }
        let init = *initial.iter().next().unwrap();
        let successors: BTreeSet<NodeIndex> = self.graph.successors(init).collect();
        if successors.len() != 1 {
            return Err(SelectionError::AmbiguousStart {
                count: successors.len(),
            });
        }
        Ok(*successors.iter().next().unwrap())
    }
}

impl<N: Clone + Eq + Hash + Ord> Default for MealyMachine<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn fmt_ports(f: &mut fmt::Formatter, kind: &str, ports: &BTreeMap<String, Domain>) -> fmt::Result {
    writeln!(f, "{} ports:", kind)?;
    for (name, domain) in ports {
        writeln!(f, "  {} : {}", name, domain)?;
    }
    Ok(())
}

impl<N: Clone + Eq + Hash + Ord + fmt::Display> fmt::Display for MealyMachine<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Mealy machine")?;
        fmt_ports(f, "input", &self.inputs)?;
        fmt_ports(f, "output", &self.outputs)?;
        write!(f, "{}", self.graph)
    }
}

/// A Moore machine: outputs are a function of the state alone.
#[derive(Debug, Clone)]
pub struct MooreMachine<N> {
    graph: LabeledGraph<N>,
    inputs: BTreeMap<String, Domain>,
    outputs: BTreeMap<String, Domain>,
}

impl<N: Clone + Eq + Hash + Ord> MooreMachine<N> {
    pub fn new() -> Self {
        MooreMachine {
            graph: LabeledGraph::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn add_input(&mut self, name: &str, domain: Domain) {
        self.graph.declare_edge_attr(name, domain.clone(), None);
        self.inputs.insert(name.to_owned(), domain);
    }

    pub fn add_output(&mut self, name: &str, domain: Domain) {
        self.graph.declare_node_attr(name, domain.clone(), None);
        self.outputs.insert(name.to_owned(), domain);
    }

    pub fn inputs(&self) -> &BTreeMap<String, Domain> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<String, Domain> {
        &self.outputs
    }

    pub fn graph(&self) -> &LabeledGraph<N> {
        &self.graph
    }

    pub fn num_states(&self) -> usize {
        self.graph.num_nodes()
    }

    /// Add a state carrying a complete output valuation.
    pub fn add_state(&mut self, id: N, output: &AttrMap) -> Result<NodeIndex, DomainError> {
        is_valuation(&self.outputs, output)?;
        let node = self.graph.add_node(id);
        for (name, value) in project(output, &self.outputs) {
            self.graph.set_node_attr(node, &name, value)?;
        }
        Ok(node)
    }

    pub fn mark_initial(&mut self, node: NodeIndex) {
        self.graph.mark_initial(node);
    }

    pub fn initial_states(&self) -> &BTreeSet<NodeIndex> {
        self.graph.initial_nodes()
    }

    pub fn state_id(&self, node: NodeIndex) -> &N {
        self.graph.node_id(node)
    }

    /// The output valuation of a state.
    pub fn output(&self, node: NodeIndex) -> AttrMap {
        project(self.graph.node_attrs(node), &self.outputs)
    }

    /// Add a transition labeled with a (partial) input valuation.
    pub fn add_transition(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        label: AttrMap,
    ) -> Result<(), DomainError> {
        self.graph.add_edge(from, to, label)
    }
}

impl<N: Clone + Eq + Hash + Ord> Default for MooreMachine<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Clone + Eq + Hash + Ord + fmt::Display> fmt::Display for MooreMachine<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Moore machine")?;
        fmt_ports(f, "input", &self.inputs)?;
        fmt_ports(f, "output", &self.outputs)?;
        write!(f, "{}", self.graph)
    }
}

/// Copy a Mealy machine without the named ports; the corresponding
/// entries are dropped from every transition label.
pub fn strip_ports<N: Clone + Eq + Hash + Ord>(
    mealy: &MealyMachine<N>,
    names: &[&str],
) -> MealyMachine<N> {
    let dropped: BTreeSet<&str> = names.iter().copied().collect();
    let mut stripped = MealyMachine::new();
    for (name, domain) in &mealy.inputs {
        if !dropped.contains(name.as_str()) {
            stripped.add_input(name, domain.clone());
        }
    }
    for (name, domain) in &mealy.outputs {
        if !dropped.contains(name.as_str()) {
            stripped.add_output(name, domain.clone());
        }
    }
    for (name, domain) in &mealy.state_vars {
        stripped.add_state_var(name, domain.clone());
    }
    for u in mealy.graph.node_indices() {
        stripped.add_state(mealy.graph.node_id(u).clone());
    }
    for &u in mealy.graph.initial_nodes() {
        stripped.mark_initial(u);
    }
    for (u, v, attrs) in mealy.graph.edges() {
        let label: AttrMap = attrs
            .iter()
            .filter(|(name, _)| !dropped.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        // Kept labels were valid in the source machine.
        stripped
            .add_transition(u, v, label)
            .unwrap_or_else(|_| unreachable!());
    }
    stripped
}
