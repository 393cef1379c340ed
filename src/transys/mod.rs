//! Finite transition systems (Kripke structures) with typed labels.
//!
//! States carry an atomic-proposition subset and, in the variable-based
//! variant, assignments to declared variables. Edges may carry
//! environment or system actions. The `owner` records who picks the
//! successor state, which decides on which side of a GR(1) specification
//! the encoded transition relation lands.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::Hash;

use log::debug;

use crate::error::{ConsistencyError, DomainError};
use crate::graph::{AttrMap, AttrValue, Domain, LabeledGraph, NodeIndex};
use crate::spec::{prime, GrSpec, Pred, VarDomain};

/// Who picks the next state of the transition system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Env,
    Sys,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Owner::Env => write!(f, "env"),
            Owner::Sys => write!(f, "sys"),
        }
    }
}

pub const ENV_ACTIONS: &str = "env_actions";
pub const SYS_ACTIONS: &str = "sys_actions";

/// A finite transition system.
#[derive(Debug, Clone)]
pub struct TransitionSystem<N> {
    graph: LabeledGraph<N>,
    owner: Owner,
    vars: BTreeMap<String, VarDomain>,
    env_vars: BTreeSet<String>,
    atomic_propositions: BTreeSet<String>,
    env_actions: Vec<String>,
    sys_actions: Vec<String>,
}

impl<N: Clone + Eq + Hash + Ord> TransitionSystem<N> {
    pub fn new(owner: Owner) -> Self {
        let mut graph = LabeledGraph::new();
        graph.declare_node_attr(
            "ap",
            Domain::Subsets(BTreeSet::new()),
            Some(AttrValue::Props(BTreeSet::new())),
        );
        TransitionSystem {
            graph,
            owner,
            vars: BTreeMap::new(),
            env_vars: BTreeSet::new(),
            atomic_propositions: BTreeSet::new(),
            env_actions: Vec::new(),
            sys_actions: Vec::new(),
        }
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn graph(&self) -> &LabeledGraph<N> {
        &self.graph
    }

    pub fn vars(&self) -> &BTreeMap<String, VarDomain> {
        &self.vars
    }

    pub fn env_vars(&self) -> &BTreeSet<String> {
        &self.env_vars
    }

    /// Widen the atomic-proposition universe used by `ap` labels.
    pub fn add_atomic_proposition(&mut self, name: &str) {
        self.atomic_propositions.insert(name.to_owned());
        self.graph.declare_node_attr(
            "ap",
            Domain::Subsets(self.atomic_propositions.clone()),
            Some(AttrValue::Props(BTreeSet::new())),
        );
    }

    pub fn atomic_propositions(&self) -> &BTreeSet<String> {
        &self.atomic_propositions
    }

    /// Add an action to the environment action alphabet.
    pub fn add_env_action(&mut self, name: &str) {
        self.env_actions.push(name.to_owned());
        self.graph
            .declare_edge_attr(ENV_ACTIONS, Domain::Enumerated(self.env_actions.clone()), None);
    }

    /// Add an action to the system action alphabet.
    pub fn add_sys_action(&mut self, name: &str) {
        self.sys_actions.push(name.to_owned());
        self.graph
            .declare_edge_attr(SYS_ACTIONS, Domain::Enumerated(self.sys_actions.clone()), None);
    }

    /// Declare a state variable; `env` marks it environment-controlled.
    /// The variable may label both states and edges.
    pub fn declare_var(&mut self, name: &str, domain: VarDomain, env: bool) {
        let port = domain.to_port_domain();
        self.graph.declare_node_attr(name, port.clone(), None);
        self.graph.declare_edge_attr(name, port, None);
        self.vars.insert(name.to_owned(), domain);
        if env {
            self.env_vars.insert(name.to_owned());
        }
    }

    pub fn add_state(&mut self, id: N) -> NodeIndex {
        self.graph.add_node(id)
    }

    pub fn mark_initial(&mut self, node: NodeIndex) {
        self.graph.mark_initial(node);
    }

    /// Label a state with its atomic-proposition subset.
    pub fn set_ap(&mut self, node: NodeIndex, props: BTreeSet<String>) -> Result<(), DomainError> {
        self.graph.set_node_attr(node, "ap", AttrValue::Props(props))
    }

    /// The atomic propositions holding at a state.
    pub fn ap(&self, node: NodeIndex) -> BTreeSet<String> {
        match self.graph.node_attrs(node).get("ap") {
            Some(AttrValue::Props(props)) => props.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// Assign a declared variable at a state.
    pub fn set_var(
        &mut self,
        node: NodeIndex,
        name: &str,
        value: AttrValue,
    ) -> Result<(), DomainError> {
        self.graph.set_node_attr(node, name, value)
    }

    pub fn add_transition(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        attrs: AttrMap,
    ) -> Result<(), DomainError> {
        self.graph.add_edge(from, to, attrs)
    }

    pub fn remove_deadends(&mut self) {
        self.graph.remove_deadends();
    }

    /// Check structural consistency: the environment-variable partition
    /// must stay within the declared variables and every stored label
    /// must still satisfy its domain. A precondition of every
    /// conversion to logic and of synchronous composition.
    pub fn is_consistent(&self) -> Result<(), ConsistencyError> {
        for name in &self.env_vars {
            if !self.vars.contains_key(name) {
                return Err(ConsistencyError::UnknownEnvVar { name: name.clone() });
            }
        }
        self.graph.validate_all()?;
        Ok(())
    }
}

impl<N: Clone + Eq + Hash + Ord + fmt::Display> TransitionSystem<N> {
    /// Encode the transition relation as a GR(1) specification fragment.
    ///
    /// A fresh variable `nodevar` enumerates the states. The initial
    /// states become a disjunction over `nodevar` (unless
    /// `ignore_initial`), variable labels are tied to their nodes, and
    /// each state's outgoing edges become a safety constraint on the
    /// primed `nodevar` and the edge labels. With `Owner::Sys` the
    /// constraints are guarantees; with `Owner::Env` they are
    /// assumptions, weakened so the system cannot win by steering the
    /// environment into a corner where all its moves need system
    /// cooperation.
    pub fn to_grspec(&self, nodevar: &str, ignore_initial: bool) -> Result<GrSpec, ConsistencyError> {
        self.is_consistent()?;
        debug!(
            "encoding {} transition system with {} states as logic",
            self.owner,
            self.graph.num_nodes()
        );

        let states: Vec<String> = self
            .graph
            .node_indices()
            .map(|u| self.graph.node_id(u).to_string())
            .collect();
        let node_dom = VarDomain::Enum(states.clone());

        let mut spec = GrSpec::new();
        match self.owner {
            Owner::Sys => {
                spec.sys_vars.insert(nodevar.to_owned(), node_dom);
            }
            Owner::Env => {
                spec.env_vars.insert(nodevar.to_owned(), node_dom);
            }
        }
        if !self.env_actions.is_empty() {
            spec.env_vars
                .insert(ENV_ACTIONS.to_owned(), VarDomain::Enum(self.env_actions.clone()));
        }
        if !self.sys_actions.is_empty() {
            spec.sys_vars
                .insert(SYS_ACTIONS.to_owned(), VarDomain::Enum(self.sys_actions.clone()));
        }
        for (name, domain) in &self.vars {
            if self.env_vars.contains(name) {
                spec.env_vars.insert(name.clone(), domain.clone());
            } else {
                spec.sys_vars.insert(name.clone(), domain.clone());
            }
        }

        let at = |u: NodeIndex| Pred::Eq(nodevar.to_owned(), AttrValue::Str(states[u].clone()));
        let at_next =
            |u: NodeIndex| Pred::Eq(prime(nodevar), AttrValue::Str(states[u].clone()));

        let mut init = Vec::new();
        if !ignore_initial {
            if self.graph.initial_nodes().is_empty() {
                return Err(ConsistencyError::NoInitialStates);
            }
            init.push(Pred::Or(
                self.graph.initial_nodes().iter().map(|&u| at(u)).collect(),
            ));
        }

        // Tie variable labels to the node carrying them, now and at
        // every next step.
        let mut node_pred = Vec::new();
        for u in self.graph.node_indices() {
            let assigns: Vec<Pred> = self
                .graph
                .node_attrs(u)
                .iter()
                .filter(|(name, _)| self.vars.contains_key(*name))
                .map(|(name, value)| Pred::Eq(name.clone(), value.clone()))
                .collect();
            if assigns.is_empty() {
                continue;
            }
            let primed_assigns: Vec<Pred> = assigns
                .iter()
                .map(|p| match p {
                    Pred::Eq(name, value) => Pred::Eq(prime(name), value.clone()),
                    _ => unreachable!(),
                })
                .collect();
            init.push(Pred::implies(at(u), Pred::And(assigns)));
            node_pred.push(Pred::implies(at_next(u), Pred::And(primed_assigns)));
        }

        let edge_action = |attrs: &AttrMap, only_env: Option<bool>| -> Vec<Pred> {
            attrs
                .iter()
                .filter(|(name, _)| match only_env {
                    None => true,
                    Some(env) => {
                        let is_env = self.env_vars.contains(*name) || *name == ENV_ACTIONS;
                        is_env == env
                    }
                })
                .map(|(name, value)| Pred::Eq(name.clone(), value.clone()))
                .collect()
        };

        let mut trans = Vec::new();
        for u in self.graph.node_indices() {
            let pre = at(u);
            if self.graph.out_degree(u) == 0 {
                // A deadend forbids any next step from here.
                trans.push(Pred::implies(pre, Pred::False));
                continue;
            }
            let mut post: Vec<Pred> = Vec::new();
            let mut sys_parts: Vec<Pred> = Vec::new();
            for (v, attrs) in self.graph.out_edges(u) {
                let mut conj = edge_action(attrs, None);
                conj.push(at_next(v));
                post.push(Pred::And(conj));
                sys_parts.push(Pred::And(edge_action(attrs, Some(false))));
            }
            if self.owner == Owner::Env {
                // The environment may also stall when every available
                // move needs a system-controlled label it cannot set.
                post.push(Pred::And(
                    sys_parts
                        .into_iter()
                        .map(|p| Pred::Not(Box::new(p)))
                        .collect(),
                ));
            }
            trans.push(Pred::implies(pre, Pred::Or(post)));
        }

        match self.owner {
            Owner::Sys => {
                spec.sys_init = init;
                spec.sys_safety = trans;
                spec.sys_safety.extend(node_pred);
            }
            Owner::Env => {
                spec.env_init = init;
                spec.env_safety = node_pred;
                spec.env_safety.extend(trans);
            }
        }
        Ok(spec)
    }
}
