//! Synchronous products of an automaton and a transition system.
//!
//! Product states are pairs of a transition-system state and an
//! automaton state, restricted to the pairs reachable from the initial
//! pairs. An automaton transition reads the atomic-proposition label of
//! the transition-system state being entered; a product edge exists
//! exactly when both sides can move on that letter.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::hash::Hash;

use log::debug;

use crate::automaton::{Acceptance, AcceptingSets, Automaton};
use crate::error::ConsistencyError;
use crate::graph::NodeIndex;
use crate::transys::TransitionSystem;

struct RawProduct<S, Q> {
    states: Vec<(S, Q)>,
    initial: BTreeSet<usize>,
    accepting: BTreeSet<usize>,
    /// Edges carry the letter read on the move: the `ap` label of the
    /// entered transition-system state.
    edges: Vec<(usize, usize, BTreeSet<String>)>,
}

fn buchi_set<Q: Clone + Eq + Hash + Ord>(
    ba: &Automaton<Q>,
) -> Result<&BTreeSet<NodeIndex>, ConsistencyError> {
    if ba.acceptance() != Acceptance::Buchi {
        return Err(ConsistencyError::UnsupportedAcceptance {
            required: "Buchi".to_owned(),
            found: ba.acceptance().to_string(),
        });
    }
    ba.check_sanity()?;
    match ba.accepting_sets() {
        AcceptingSets::Nodes(set) => Ok(set),
        // check_sanity established the Buchi shape.
        _ => unreachable!(),
    }
}

struct Frontier {
    index: BTreeMap<(NodeIndex, NodeIndex), usize>,
    pairs: Vec<(NodeIndex, NodeIndex)>,
    queue: VecDeque<(NodeIndex, NodeIndex)>,
}

impl Frontier {
    fn intern<S, Q>(
        &mut self,
        ts: &TransitionSystem<S>,
        ba: &Automaton<Q>,
        states: &mut Vec<(S, Q)>,
        s: NodeIndex,
        q: NodeIndex,
    ) -> usize
    where
        S: Clone + Eq + Hash + Ord,
        Q: Clone + Eq + Hash + Ord,
    {
        let pairs = &mut self.pairs;
        let queue = &mut self.queue;
        *self.index.entry((s, q)).or_insert_with(|| {
            let id = states.len();
            states.push((
                ts.graph().node_id(s).clone(),
                ba.graph().node_id(q).clone(),
            ));
            pairs.push((s, q));
            queue.push_back((s, q));
            id
        })
    }
}

fn build<S, Q>(
    ts: &TransitionSystem<S>,
    ba: &Automaton<Q>,
) -> Result<RawProduct<S, Q>, ConsistencyError>
where
    S: Clone + Eq + Hash + Ord,
    Q: Clone + Eq + Hash + Ord,
{
    ts.is_consistent()?;
    let accepting_ba = buchi_set(ba)?.clone();

    let mut states: Vec<(S, Q)> = Vec::new();
    let mut initial = BTreeSet::new();
    let mut accepting = BTreeSet::new();
    let mut edges = Vec::new();
    let mut frontier = Frontier {
        index: BTreeMap::new(),
        pairs: Vec::new(),
        queue: VecDeque::new(),
    };

    // Initial pairs: the automaton must accept the labeling of the
    // initial transition-system state from one of its own initial
    // states.
    for &s in ts.graph().initial_nodes() {
        let letter = ts.ap(s);
        for &q in ba.graph().initial_nodes() {
            let moves: Vec<NodeIndex> = ba
                .guarded_edges(q)
                .filter(|(_, guard)| **guard == letter)
                .map(|(q2, _)| q2)
                .collect();
            for q2 in moves {
                let id = frontier.intern(ts, ba, &mut states, s, q2);
                initial.insert(id);
            }
        }
    }

    while let Some((s, q)) = frontier.queue.pop_front() {
        let from = frontier.index[&(s, q)];
        let targets: Vec<NodeIndex> = ts.graph().successors(s).collect();
        for s2 in targets {
            let letter = ts.ap(s2);
            let moves: Vec<NodeIndex> = ba
                .guarded_edges(q)
                .filter(|(_, guard)| **guard == letter)
                .map(|(q2, _)| q2)
                .collect();
            for q2 in moves {
                let to = frontier.intern(ts, ba, &mut states, s2, q2);
                edges.push((from, to, letter.clone()));
            }
        }
    }

    for (id, &(_, q)) in frontier.pairs.iter().enumerate() {
        if accepting_ba.contains(&q) {
            accepting.insert(id);
        }
    }
    debug!(
        "synchronous product: {} reachable pair(s), {} accepting",
        states.len(),
        accepting.len()
    );
    Ok(RawProduct {
        states,
        initial,
        accepting,
        edges,
    })
}

/// Product automaton of a Buchi automaton and a transition system.
///
/// The result is again a Buchi automaton over the transition system's
/// propositions; its accepting states are the reachable pairs whose
/// automaton component is accepting.
pub fn ba_ts_sync_prod<Q, S>(
    ba: &Automaton<Q>,
    ts: &TransitionSystem<S>,
) -> Result<Automaton<(S, Q)>, ConsistencyError>
where
    S: Clone + Eq + Hash + Ord,
    Q: Clone + Eq + Hash + Ord,
{
    let raw = build(ts, ba)?;
    let mut prod = Automaton::new(Acceptance::Buchi);
    for p in ts.atomic_propositions() {
        prod.add_atomic_proposition(p);
    }
    for id in raw.states {
        prod.add_state(id);
    }
    for &id in &raw.initial {
        prod.mark_initial(id);
    }
    for &id in &raw.accepting {
        prod.mark_accepting(id);
    }
    for (from, to, guard) in raw.edges {
        // Guards are ap labels, within the declared alphabet.
        prod.add_guarded_edge(from, to, guard)
            .unwrap_or_else(|_| unreachable!());
    }
    Ok(prod)
}

/// Product transition system of a transition system and a Buchi
/// automaton, together with its persistent states: the reachable pairs
/// whose automaton component is accepting.
pub fn ts_ba_sync_prod<S, Q>(
    ts: &TransitionSystem<S>,
    ba: &Automaton<Q>,
) -> Result<(TransitionSystem<(S, Q)>, BTreeSet<(S, Q)>), ConsistencyError>
where
    S: Clone + Eq + Hash + Ord,
    Q: Clone + Eq + Hash + Ord,
{
    let raw = build(ts, ba)?;
    let mut prod = TransitionSystem::new(ts.owner());
    for p in ts.atomic_propositions() {
        prod.add_atomic_proposition(p);
    }
    let mut persistent = BTreeSet::new();
    for (id, pair) in raw.states.iter().enumerate() {
        let node = prod.add_state(pair.clone());
        // The pair inherits the proposition labeling of its
        // transition-system component.
        let s = ts.graph().index_of(&pair.0).unwrap_or_else(|| unreachable!());
        prod.set_ap(node, ts.ap(s)).unwrap_or_else(|_| unreachable!());
        if raw.accepting.contains(&id) {
            persistent.insert(pair.clone());
        }
    }
    for &id in &raw.initial {
        prod.mark_initial(id);
    }
    for (from, to, _) in raw.edges {
        prod.add_transition(from, to, BTreeMap::new())
            .unwrap_or_else(|_| unreachable!());
    }
    Ok((prod, persistent))
}
