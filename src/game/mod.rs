//! Two-player game graphs and parity games.
//!
//! Ownership is a per-node attribute; an edge is controlled by the
//! player owning its source node. The winner computation itself lives
//! in external solvers; this module only carries the structure they
//! consume.

use std::collections::BTreeSet;
use std::hash::Hash;

use crate::error::DomainError;
use crate::graph::{AttrMap, AttrValue, Domain, LabeledGraph, NodeIndex};

/// A graph whose nodes are owned by player 0 or player 1.
#[derive(Debug, Clone)]
pub struct GameGraph<N> {
    graph: LabeledGraph<N>,
}

impl<N: Clone + Eq + Hash + Ord> GameGraph<N> {
    pub fn new() -> Self {
        let mut graph = LabeledGraph::new();
        graph.declare_node_attr("player", Domain::Range(0, 1), Some(AttrValue::Int(0)));
        GameGraph { graph }
    }

    pub fn graph(&self) -> &LabeledGraph<N> {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut LabeledGraph<N> {
        &mut self.graph
    }

    pub fn add_state(&mut self, id: N, player: u8) -> Result<NodeIndex, DomainError> {
        let node = self.graph.add_node(id);
        self.graph
            .set_node_attr(node, "player", AttrValue::Int(i64::from(player)))?;
        Ok(node)
    }

    pub fn mark_initial(&mut self, node: NodeIndex) {
        self.graph.mark_initial(node);
    }

    pub fn add_transition(&mut self, from: NodeIndex, to: NodeIndex) {
        // Plain edges always satisfy the empty edge schema.
        self.graph
            .add_edge(from, to, AttrMap::new())
            .unwrap_or_else(|_| unreachable!());
    }

    pub fn player(&self, node: NodeIndex) -> u8 {
        match self.graph.node_attrs(node).get("player") {
            Some(AttrValue::Int(p)) => *p as u8,
            _ => 0,
        }
    }

    /// All nodes owned by player `n`.
    pub fn player_states(&self, n: u8) -> BTreeSet<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&u| self.player(u) == n)
            .collect()
    }

    /// The player who chooses whether to take the edge, i.e. the owner
    /// of its source node.
    pub fn edge_controlled_by(&self, edge: (NodeIndex, NodeIndex)) -> u8 {
        self.player(edge.0)
    }
}

impl<N: Clone + Eq + Hash + Ord> Default for GameGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A game graph where every node additionally carries a color in
/// `0..colors`, for parity winning conditions.
#[derive(Debug, Clone)]
pub struct ParityGame<N> {
    game: GameGraph<N>,
    colors: i64,
}

impl<N: Clone + Eq + Hash + Ord> ParityGame<N> {
    /// A parity game with colors `0..colors - 1`; nodes default to
    /// color 0.
    ///
    /// # Panics
    ///
    /// Panics when `colors < 1`: every node carries a color, so the
    /// color range must be inhabited.
    pub fn new(colors: i64) -> Self {
        assert!(colors >= 1, "a parity game needs at least one color");
        let mut game = GameGraph::new();
        game.graph_mut()
            .declare_node_attr("color", Domain::Range(0, colors - 1), Some(AttrValue::Int(0)));
        ParityGame { game, colors }
    }

    pub fn game(&self) -> &GameGraph<N> {
        &self.game
    }

    pub fn num_colors(&self) -> i64 {
        self.colors
    }

    pub fn add_state(&mut self, id: N, player: u8, color: i64) -> Result<NodeIndex, DomainError> {
        let node = self.game.add_state(id, player)?;
        self.game
            .graph_mut()
            .set_node_attr(node, "color", AttrValue::Int(color))?;
        Ok(node)
    }

    pub fn mark_initial(&mut self, node: NodeIndex) {
        self.game.mark_initial(node);
    }

    pub fn add_transition(&mut self, from: NodeIndex, to: NodeIndex) {
        self.game.add_transition(from, to);
    }

    pub fn color(&self, node: NodeIndex) -> i64 {
        match self.game.graph().node_attrs(node).get("color") {
            Some(AttrValue::Int(c)) => *c,
            _ => 0,
        }
    }

    /// The maximum color assigned to any node, or `None` for an empty
    /// game. The winner parity is determined at the calling site.
    pub fn max_color(&self) -> Option<i64> {
        self.game
            .graph()
            .node_indices()
            .map(|u| self.color(u))
            .max()
    }
}
