//! Generic labeled directed multigraphs with typed attribute schemas.
//!
//! Nodes are identified by an opaque id `N` and stored in a `Vec`
//! addressed by [`NodeIndex`]; an interning map takes ids back to
//! indices. Parallel edges are allowed. Node and edge attributes are
//! validated against per-graph schemas at the point of assignment.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;

use fixedbitset::FixedBitSet;
use log::debug;

use crate::error::DomainError;

/// Index of a node in a graph.
pub type NodeIndex = usize;

/// A value attached to a node or edge attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttrValue {
    Int(i64),
    Str(String),
    Props(BTreeSet<String>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Str(s) => write!(f, "\"{}\"", s),
            AttrValue::Props(props) => {
                write!(f, "{{")?;
                for (i, p) in props.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// The set of values an attribute may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Domain {
    /// Exactly `Int(0)` and `Int(1)`.
    Boolean,
    /// Integers in the inclusive range.
    Range(i64, i64),
    /// One of a fixed list of strings.
    Enumerated(Vec<String>),
    /// Any subset of a fixed universe of propositions.
    Subsets(BTreeSet<String>),
    /// An explicit, finite set of values.
    Explicit(BTreeSet<AttrValue>),
    /// Unconstrained.
    Free,
}

impl Domain {
    pub fn contains(&self, value: &AttrValue) -> bool {
        match (self, value) {
            (Domain::Boolean, AttrValue::Int(v)) => *v == 0 || *v == 1,
            (Domain::Range(lo, hi), AttrValue::Int(v)) => lo <= v && v <= hi,
            (Domain::Enumerated(values), AttrValue::Str(s)) => values.iter().any(|v| v == s),
            (Domain::Subsets(universe), AttrValue::Props(props)) => props.is_subset(universe),
            (Domain::Explicit(values), v) => values.contains(v),
            (Domain::Free, _) => true,
            _ => false,
        }
    }

}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Domain::Boolean => write!(f, "boolean"),
            Domain::Range(lo, hi) => write!(f, "[{}, {}]", lo, hi),
            Domain::Enumerated(values) => write!(f, "one of {:?}", values),
            Domain::Subsets(universe) => write!(f, "subsets of {:?}", universe),
            Domain::Explicit(values) => {
                write!(f, "{{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
            Domain::Free => write!(f, "free"),
        }
    }
}

/// A declared attribute slot: its domain and an optional default value
/// applied when a node is created without the attribute.
#[derive(Debug, Clone)]
pub struct AttrSpec {
    pub domain: Domain,
    pub default: Option<AttrValue>,
}

/// An attribute valuation, for node labels, edge labels and filters.
pub type AttrMap = BTreeMap<String, AttrValue>;

#[derive(Debug, Clone)]
struct Edge {
    to: NodeIndex,
    attrs: AttrMap,
}

#[derive(Debug, Clone)]
struct NodeData<N> {
    id: N,
    attrs: AttrMap,
    out: Vec<Edge>,
}

/// A labeled directed multigraph with a distinguished set of initial
/// nodes.
#[derive(Debug, Clone)]
pub struct LabeledGraph<N> {
    nodes: Vec<NodeData<N>>,
    mapping: HashMap<N, NodeIndex>,
    node_schema: BTreeMap<String, AttrSpec>,
    edge_schema: BTreeMap<String, AttrSpec>,
    initial: BTreeSet<NodeIndex>,
}

fn validate(schema: &BTreeMap<String, AttrSpec>, attrs: &AttrMap) -> Result<(), DomainError> {
    for (name, value) in attrs {
        let spec = schema.get(name).ok_or_else(|| DomainError::Undeclared {
            name: name.clone(),
        })?;
        if !spec.domain.contains(value) {
            return Err(DomainError::OutOfDomain {
                name: name.clone(),
                value: value.to_string(),
                domain: spec.domain.to_string(),
            });
        }
    }
    Ok(())
}

impl<N: Clone + Eq + Hash + Ord> LabeledGraph<N> {
    pub fn new() -> Self {
        LabeledGraph {
            nodes: Vec::new(),
            mapping: HashMap::new(),
            node_schema: BTreeMap::new(),
            edge_schema: BTreeMap::new(),
            initial: BTreeSet::new(),
        }
    }

    /// Declare (or re-declare) a node attribute.
    ///
    /// Re-declaration widens the schema for future assignments; values
    /// already stored are not re-checked until [`validate_all`].
    ///
    /// # Panics
    ///
    /// Panics when the default value lies outside the declared domain.
    ///
    /// [`validate_all`]: LabeledGraph::validate_all
    pub fn declare_node_attr(&mut self, name: &str, domain: Domain, default: Option<AttrValue>) {
        if let Some(value) = &default {
            assert!(
                domain.contains(value),
                "default {} of node attribute `{}` is outside its domain {}",
                value,
                name,
                domain
            );
        }
        self.node_schema
            .insert(name.to_owned(), AttrSpec { domain, default });
    }

    /// Declare (or re-declare) an edge attribute.
    ///
    /// # Panics
    ///
    /// Panics when the default value lies outside the declared domain.
    pub fn declare_edge_attr(&mut self, name: &str, domain: Domain, default: Option<AttrValue>) {
        if let Some(value) = &default {
            assert!(
                domain.contains(value),
                "default {} of edge attribute `{}` is outside its domain {}",
                value,
                name,
                domain
            );
        }
        self.edge_schema
            .insert(name.to_owned(), AttrSpec { domain, default });
    }

    pub fn node_attr_spec(&self, name: &str) -> Option<&AttrSpec> {
        self.node_schema.get(name)
    }

    pub fn edge_attr_spec(&self, name: &str) -> Option<&AttrSpec> {
        self.edge_schema.get(name)
    }

    /// Add a node, or return the index of the existing node with the
    /// same id. Declared defaults are filled in for a new node.
    pub fn add_node(&mut self, id: N) -> NodeIndex {
        if let Some(&index) = self.mapping.get(&id) {
            return index;
        }
        let mut attrs = AttrMap::new();
        for (name, spec) in &self.node_schema {
            if let Some(default) = &spec.default {
                attrs.insert(name.clone(), default.clone());
            }
        }
        let index = self.nodes.len();
        self.mapping.insert(id.clone(), index);
        self.nodes.push(NodeData {
            id,
            attrs,
            out: Vec::new(),
        });
        index
    }

    /// Set a node attribute, validating against the schema.
    pub fn set_node_attr(
        &mut self,
        node: NodeIndex,
        name: &str,
        value: AttrValue,
    ) -> Result<(), DomainError> {
        let spec = self
            .node_schema
            .get(name)
            .ok_or_else(|| DomainError::Undeclared {
                name: name.to_owned(),
            })?;
        if !spec.domain.contains(&value) {
            return Err(DomainError::OutOfDomain {
                name: name.to_owned(),
                value: value.to_string(),
                domain: spec.domain.to_string(),
            });
        }
        self.nodes[node].attrs.insert(name.to_owned(), value);
        Ok(())
    }

    /// Add an edge, validating its attributes against the edge schema.
    /// Parallel edges are allowed.
    pub fn add_edge(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        attrs: AttrMap,
    ) -> Result<(), DomainError> {
        validate(&self.edge_schema, &attrs)?;
        self.nodes[from].out.push(Edge { to, attrs });
        Ok(())
    }

    pub fn mark_initial(&mut self, node: NodeIndex) {
        self.initial.insert(node);
    }

    pub fn initial_nodes(&self) -> &BTreeSet<NodeIndex> {
        &self.initial
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.nodes.iter().map(|n| n.out.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_id(&self, node: NodeIndex) -> &N {
        &self.nodes[node].id
    }

    pub fn index_of(&self, id: &N) -> Option<NodeIndex> {
        self.mapping.get(id).copied()
    }

    pub fn node_attrs(&self, node: NodeIndex) -> &AttrMap {
        &self.nodes[node].attrs
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        0..self.nodes.len()
    }

    pub fn out_degree(&self, node: NodeIndex) -> usize {
        self.nodes[node].out.len()
    }

    /// Out-edges of a node as `(target, attributes)` pairs, in insertion
    /// order.
    pub fn out_edges(&self, node: NodeIndex) -> impl Iterator<Item = (NodeIndex, &AttrMap)> + '_ {
        self.nodes[node].out.iter().map(|e| (e.to, &e.attrs))
    }

    pub fn successors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes[node].out.iter().map(|e| e.to)
    }

    /// All edges as `(from, to, attributes)` triples.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &AttrMap)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(u, n)| n.out.iter().map(move |e| (u, e.to, &e.attrs)))
    }

    /// Nodes whose attributes agree with `filter` on every filter key,
    /// by exact value equality. An empty filter matches every candidate.
    pub fn find_nodes(
        &self,
        candidates: Option<&BTreeSet<NodeIndex>>,
        filter: &AttrMap,
    ) -> Vec<(NodeIndex, &AttrMap)> {
        self.node_indices()
            .filter(|&u| candidates.map_or(true, |c| c.contains(&u)))
            .filter(|&u| matches_filter(&self.nodes[u].attrs, filter))
            .map(|u| (u, &self.nodes[u].attrs))
            .collect()
    }

    /// Edges matching the endpoint restrictions and label filter.
    ///
    /// An unlabeled edge never matches a non-empty filter, by the same
    /// rule a node without the attribute does not match.
    pub fn find_edges(
        &self,
        from: Option<&BTreeSet<NodeIndex>>,
        to: Option<&BTreeSet<NodeIndex>>,
        filter: &AttrMap,
    ) -> Vec<(NodeIndex, NodeIndex, &AttrMap)> {
        let mut found = Vec::new();
        for u in self.node_indices() {
            if let Some(f) = from {
                if !f.contains(&u) {
                    continue;
                }
            }
            for e in &self.nodes[u].out {
                if let Some(t) = to {
                    if !t.contains(&e.to) {
                        continue;
                    }
                }
                if matches_filter(&e.attrs, filter) {
                    found.push((u, e.to, &e.attrs));
                }
            }
        }
        found
    }

    /// Keep only the out-edges of `node` for which `keep` returns true.
    /// The predicate receives the edge position, target and attributes.
    pub fn retain_out_edges<F>(&mut self, node: NodeIndex, mut keep: F)
    where
        F: FnMut(usize, NodeIndex, &AttrMap) -> bool,
    {
        let mut position = 0;
        self.nodes[node].out.retain(|e| {
            let kept = keep(position, e.to, &e.attrs);
            position += 1;
            kept
        });
    }

    /// Keep only the nodes set in `keep`, remapping indices and dropping
    /// edges with a removed endpoint. The initial set is intersected
    /// with the survivors.
    pub fn retain_nodes(&mut self, keep: &FixedBitSet) {
        let mut remap = vec![usize::MAX; self.nodes.len()];
        let mut new_nodes = Vec::with_capacity(keep.count_ones(..));
        for (old_index, node) in self.nodes.drain(..).enumerate() {
            if keep.contains(old_index) {
                remap[old_index] = new_nodes.len();
                new_nodes.push(node);
            }
        }
        for node in &mut new_nodes {
            node.out.retain(|e| remap[e.to] != usize::MAX);
            for e in &mut node.out {
                e.to = remap[e.to];
            }
        }
        self.mapping = new_nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
        self.initial = self
            .initial
            .iter()
            .filter(|&&u| remap[u] != usize::MAX)
            .map(|&u| remap[u])
            .collect();
        self.nodes = new_nodes;
    }

    /// Repeatedly remove nodes without outgoing edges until none remain.
    ///
    /// Removing a node may orphan its predecessors, so the prune runs to
    /// a fixpoint. A node whose only edge is a self-loop survives.
    pub fn remove_deadends(&mut self) {
        let n = self.nodes.len();
        let mut keep = FixedBitSet::with_capacity(n);
        keep.insert_range(..);
        loop {
            let mut changed = false;
            for u in 0..n {
                if keep.contains(u) && !self.nodes[u].out.iter().any(|e| keep.contains(e.to)) {
                    keep.set(u, false);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        let kept = keep.count_ones(..);
        if kept != n {
            debug!("removing {} deadend node(s) of {}", n - kept, n);
            self.retain_nodes(&keep);
        }
    }

    /// Re-check every stored node and edge attribute against the current
    /// schemas. Needed after a schema re-declaration narrows a domain.
    pub fn validate_all(&self) -> Result<(), DomainError> {
        for node in &self.nodes {
            validate(&self.node_schema, &node.attrs)?;
            for e in &node.out {
                validate(&self.edge_schema, &e.attrs)?;
            }
        }
        Ok(())
    }
}

impl<N: Clone + Eq + Hash + Ord> Default for LabeledGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filter(attrs: &AttrMap, filter: &AttrMap) -> bool {
    filter.iter().all(|(k, v)| attrs.get(k) == Some(v))
}

/// Formats an attribute valuation as `{k: v, ...}`.
pub(crate) fn fmt_attrs(f: &mut fmt::Formatter, attrs: &AttrMap) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (name, value)) in attrs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", name, value)?;
    }
    write!(f, "}}")
}

impl<N: Clone + Eq + Hash + Ord + fmt::Display> fmt::Display for LabeledGraph<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for u in self.node_indices() {
            let marker = if self.initial.contains(&u) { "-> " } else { "   " };
            write!(f, "{}{}: ", marker, self.nodes[u].id)?;
            fmt_attrs(f, &self.nodes[u].attrs)?;
            writeln!(f)?;
            for e in &self.nodes[u].out {
                write!(f, "      --> {}: ", self.nodes[e.to].id)?;
                fmt_attrs(f, &e.attrs)?;
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
