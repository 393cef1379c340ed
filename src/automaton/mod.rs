//! Automata over proposition-set alphabets with a pluggable acceptance
//! condition.
//!
//! The automaton reads letters that are subsets of its atomic
//! propositions; a guard on an edge is the exact letter it accepts.
//! Acceptance semantics are consumed by the product and model-checking
//! stages, not evaluated here; this module only keeps the encoding
//! well-formed.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;

use crate::error::{ConsistencyError, DomainError};
use crate::graph::{AttrMap, AttrValue, Domain, LabeledGraph, NodeIndex};

/// The kind of acceptance condition an automaton carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Finite words, accepting on reaching the set.
    Finite,
    Buchi,
    CoBuchi,
    WeakBuchi,
    GeneralizedBuchi,
    Rabin,
    Streett,
    Muller,
    Parity,
}

impl fmt::Display for Acceptance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Acceptance::Finite => "finite",
            Acceptance::Buchi => "Buchi",
            Acceptance::CoBuchi => "coBuchi",
            Acceptance::WeakBuchi => "weak Buchi",
            Acceptance::GeneralizedBuchi => "generalized Buchi",
            Acceptance::Rabin => "Rabin",
            Acceptance::Streett => "Streett",
            Acceptance::Muller => "Muller",
            Acceptance::Parity => "parity",
        };
        write!(f, "{}", name)
    }
}

/// One Rabin or Streett pair.
///
/// Rabin accepts when some pair has its `infinitely_often` set visited
/// infinitely often while `eventually_always_not` is eventually avoided
/// forever; Streett requires that of every pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptancePair {
    pub infinitely_often: BTreeSet<NodeIndex>,
    pub eventually_always_not: BTreeSet<NodeIndex>,
}

/// The accepting-set encoding; its shape must match the acceptance kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptingSets {
    /// A plain node set (finite, Buchi, coBuchi, weak Buchi).
    Nodes(BTreeSet<NodeIndex>),
    /// A list of node sets (generalized Buchi, Muller).
    Families(Vec<BTreeSet<NodeIndex>>),
    /// Rabin/Streett pairs.
    Pairs(Vec<AcceptancePair>),
    /// Inclusive color range for parity acceptance.
    Colors { min: i64, max: i64 },
}

fn shape_matches(acceptance: Acceptance, sets: &AcceptingSets) -> bool {
    match acceptance {
        Acceptance::Finite | Acceptance::Buchi | Acceptance::CoBuchi | Acceptance::WeakBuchi => {
            matches!(sets, AcceptingSets::Nodes(_))
        }
        Acceptance::GeneralizedBuchi | Acceptance::Muller => {
            matches!(sets, AcceptingSets::Families(_))
        }
        Acceptance::Rabin | Acceptance::Streett => matches!(sets, AcceptingSets::Pairs(_)),
        Acceptance::Parity => matches!(sets, AcceptingSets::Colors { .. }),
    }
}

/// An automaton: a labeled graph with guarded edges, an acceptance
/// condition and a universal/existential node partition.
#[derive(Debug, Clone)]
pub struct Automaton<N> {
    graph: LabeledGraph<N>,
    acceptance: Acceptance,
    accepting: AcceptingSets,
    universal: BTreeSet<NodeIndex>,
    atomic_propositions: BTreeSet<String>,
}

impl<N: Clone + Eq + Hash + Ord> Automaton<N> {
    /// Create an automaton with empty accepting sets of the shape that
    /// matches `acceptance`.
    pub fn new(acceptance: Acceptance) -> Self {
        let accepting = match acceptance {
            Acceptance::Finite | Acceptance::Buchi | Acceptance::CoBuchi | Acceptance::WeakBuchi => {
                AcceptingSets::Nodes(BTreeSet::new())
            }
            Acceptance::GeneralizedBuchi | Acceptance::Muller => {
                AcceptingSets::Families(Vec::new())
            }
            Acceptance::Rabin | Acceptance::Streett => AcceptingSets::Pairs(Vec::new()),
            Acceptance::Parity => AcceptingSets::Colors { min: 0, max: 0 },
        };
        let mut graph = LabeledGraph::new();
        graph.declare_edge_attr("guard", Domain::Subsets(BTreeSet::new()), None);
        Automaton {
            graph,
            acceptance,
            accepting,
            universal: BTreeSet::new(),
            atomic_propositions: BTreeSet::new(),
        }
    }

    pub fn acceptance(&self) -> Acceptance {
        self.acceptance
    }

    pub fn graph(&self) -> &LabeledGraph<N> {
        &self.graph
    }

    /// Widen the guard alphabet with a new atomic proposition.
    pub fn add_atomic_proposition(&mut self, name: &str) {
        self.atomic_propositions.insert(name.to_owned());
        self.graph.declare_edge_attr(
            "guard",
            Domain::Subsets(self.atomic_propositions.clone()),
            None,
        );
    }

    pub fn atomic_propositions(&self) -> &BTreeSet<String> {
        &self.atomic_propositions
    }

    pub fn add_state(&mut self, id: N) -> NodeIndex {
        self.graph.add_node(id)
    }

    pub fn mark_initial(&mut self, node: NodeIndex) {
        self.graph.mark_initial(node);
    }

    pub fn mark_universal(&mut self, node: NodeIndex) {
        self.universal.insert(node);
    }

    pub fn universal_nodes(&self) -> &BTreeSet<NodeIndex> {
        &self.universal
    }

    /// Add an edge accepting exactly the letter `guard`.
    pub fn add_guarded_edge(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        guard: BTreeSet<String>,
    ) -> Result<(), DomainError> {
        let mut attrs = AttrMap::new();
        attrs.insert("guard".to_owned(), AttrValue::Props(guard));
        self.graph.add_edge(from, to, attrs)
    }

    /// Out-edges of a node as `(target, guard)` pairs. Edges without a
    /// guard (never produced by [`add_guarded_edge`]) are skipped.
    ///
    /// [`add_guarded_edge`]: Automaton::add_guarded_edge
    pub fn guarded_edges(
        &self,
        node: NodeIndex,
    ) -> impl Iterator<Item = (NodeIndex, &BTreeSet<String>)> + '_ {
        self.graph.out_edges(node).filter_map(|(to, attrs)| {
            match attrs.get("guard") {
                Some(AttrValue::Props(guard)) => Some((to, guard)),
                _ => None,
            }
        })
    }

    pub fn accepting_sets(&self) -> &AcceptingSets {
        &self.accepting
    }

    /// Replace the accepting sets wholesale. The shape is not checked
    /// here; [`check_sanity`] reports a mismatch.
    ///
    /// [`check_sanity`]: Automaton::check_sanity
    pub fn set_accepting_sets(&mut self, sets: AcceptingSets) {
        self.accepting = sets;
    }

    /// Add a node to a plain accepting set. Only meaningful for the
    /// Buchi-family shapes; other shapes are left untouched and the
    /// mismatch surfaces in [`check_sanity`].
    ///
    /// [`check_sanity`]: Automaton::check_sanity
    pub fn mark_accepting(&mut self, node: NodeIndex) {
        if let AcceptingSets::Nodes(set) = &mut self.accepting {
            set.insert(node);
        }
    }

    /// Validate the acceptance encoding: the accepting-set shape must
    /// match the acceptance kind, every referenced node must exist, and
    /// the universal set must be a node subset.
    pub fn check_sanity(&self) -> Result<(), ConsistencyError> {
        if !shape_matches(self.acceptance, &self.accepting) {
            return Err(ConsistencyError::AcceptanceShape {
                acceptance: self.acceptance.to_string(),
            });
        }
        let n = self.graph.num_nodes();
        let check_set = |set: &BTreeSet<NodeIndex>| -> Result<(), ConsistencyError> {
            match set.iter().find(|&&u| u >= n) {
                Some(&u) => Err(ConsistencyError::UnknownAcceptingNode { index: u }),
                None => Ok(()),
            }
        };
        match &self.accepting {
            AcceptingSets::Nodes(set) => check_set(set)?,
            AcceptingSets::Families(families) => {
                for set in families {
                    check_set(set)?;
                }
            }
            AcceptingSets::Pairs(pairs) => {
                for pair in pairs {
                    check_set(&pair.infinitely_often)?;
                    check_set(&pair.eventually_always_not)?;
                }
            }
            AcceptingSets::Colors { min, max } => {
                if min > max {
                    return Err(ConsistencyError::AcceptanceShape {
                        acceptance: self.acceptance.to_string(),
                    });
                }
            }
        }
        if let Some(&u) = self.universal.iter().find(|&&u| u >= n) {
            return Err(ConsistencyError::UnknownUniversalNode { index: u });
        }
        Ok(())
    }
}
