//! Interface to external GR(1) game solvers.
//!
//! Solving the game is out of scope for this crate; a back-end
//! implements [`Gr1Solver`] and hands back its winning strategy as a
//! [`RawStrategyGraph`], which [`crate::machine::strategy_to_mealy`]
//! then turns into an executable transducer.

use std::collections::BTreeMap;
use std::fmt;

use crate::spec::GrSpec;

/// A node of a raw strategy: a full integer-coded valuation of every
/// declared specification variable. Enumerated variables are coded by
/// list position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyNode {
    pub state: BTreeMap<String, i64>,
}

/// The strategy graph produced by a solver, before conversion.
///
/// Nodes are addressed by insertion order; edges point from a game
/// position to the positions the strategy allows next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStrategyGraph {
    nodes: Vec<StrategyNode>,
    edges: Vec<(usize, usize)>,
}

impl RawStrategyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, state: BTreeMap<String, i64>) -> usize {
        self.nodes.push(StrategyNode { state });
        self.nodes.len() - 1
    }

    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.edges.push((from, to));
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn state(&self, node: usize) -> &BTreeMap<String, i64> {
        &self.nodes[node].state
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edges.iter().copied()
    }

    pub fn successors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .filter(move |(from, _)| *from == node)
            .map(|(_, to)| *to)
    }
}

impl fmt::Display for RawStrategyGraph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            write!(f, "  {}: {{", i)?;
            for (j, (name, value)) in node.state.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", name, value)?;
            }
            writeln!(f, "}}")?;
        }
        for (from, to) in &self.edges {
            writeln!(f, "  {} --> {}", from, to)?;
        }
        Ok(())
    }
}

/// A black-box GR(1) synthesis back-end.
pub trait Gr1Solver {
    /// Synthesize a winning strategy for the system, or `None` when the
    /// specification is unrealizable.
    fn synthesize(&self, spec: &GrSpec) -> Option<RawStrategyGraph>;

    /// Decide realizability without producing a strategy.
    fn check_realizable(&self, spec: &GrSpec) -> bool;
}
