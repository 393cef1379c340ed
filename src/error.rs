//! Error types for graph construction, strategy conversion and simulation.
//!
//! Expected-absence outcomes (an unrealizable specification) are reported
//! as `None` by the synthesis entry points and are not errors. The types
//! here cover genuine structural defects that cannot be retried without
//! upstream correction.

use thiserror::Error;

/// An attribute assignment that violates the declared schema of a graph.
///
/// Raised synchronously at the point of assignment, never deferred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The attribute name was never declared and implicit widening is
    /// not allowed.
    #[error("attribute `{name}` is not declared for this graph")]
    Undeclared { name: String },
    /// The value lies outside the declared domain of the attribute.
    #[error("value {value} of attribute `{name}` is outside its declared domain {domain}")]
    OutOfDomain {
        name: String,
        value: String,
        domain: String,
    },
    /// A valuation that must cover every declared port is missing one.
    #[error("valuation is missing a value for port `{name}`")]
    IncompleteValuation { name: String },
}

/// A structural consistency check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    /// The acceptance condition does not match the shape of the
    /// accepting sets, e.g. Rabin acceptance with a plain node set.
    #[error("acceptance `{acceptance}` does not match the shape of the accepting sets")]
    AcceptanceShape { acceptance: String },
    /// The accepting sets reference a node that is not in the automaton.
    #[error("accepting sets reference node index {index}, which is not in the automaton")]
    UnknownAcceptingNode { index: usize },
    /// A universal node index that is not in the automaton.
    #[error("universal nodes reference node index {index}, which is not in the automaton")]
    UnknownUniversalNode { index: usize },
    /// An environment variable that was never declared as a variable.
    #[error("environment variable `{name}` is not a declared variable")]
    UnknownEnvVar { name: String },
    /// A transition system without initial states cannot be encoded as
    /// an initial-condition formula.
    #[error("transition system has no initial states; its initial condition would be `false`")]
    NoInitialStates,
    /// A stored label no longer satisfies its declared domain.
    #[error("stored label violates its declared domain: {0}")]
    Label(#[from] DomainError),
    /// Input-non-determinism in a context that requires a deterministic
    /// machine.
    #[error("machine is not input-deterministic at state `{state}`")]
    NonDeterministic { state: String },
    /// The acceptance condition is not supported by this operation.
    #[error("operation requires {required} acceptance, found `{found}`")]
    UnsupportedAcceptance { required: String, found: String },
}

/// The upstream solver returned an empty strategy where a non-empty one
/// was required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("solver returned an empty strategy; the specification is unrealizable or degenerate")]
pub struct SynthesisFailure;

/// A fatal defect discovered while converting a strategy to a transducer.
///
/// Carries a full dump of the offending strategy and the partially built
/// machine for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// No strategy state satisfies the specification's own initial
    /// condition, so the machine would have no initial reaction.
    #[error(
        "machine obtained from the strategy has no initial reactions\n\
         strategy:\n{strategy}\nmachine:\n{machine}"
    )]
    NoInitialReaction { strategy: String, machine: String },
    /// A strategy node assigns a value outside the declared domain of a
    /// variable.
    #[error("strategy node {node} assigns {value} to `{var}`, outside its declared domain")]
    StateOutOfDomain {
        node: usize,
        var: String,
        value: i64,
    },
    /// A strategy node is missing a value for a declared variable.
    #[error("strategy node {node} has no value for declared variable `{var}`")]
    StateMissingVar { node: usize, var: String },
}

/// An ill-formed or ambiguous simulation query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// A guided run is missing an input sequence for one or more ports.
    #[error("missing input sequence for port(s): {0:?}")]
    MissingPorts(Vec<String>),
    /// An input sequence has a length different from the requested
    /// number of steps.
    #[error("input sequence for port `{name}` has length {len}, expected {expected}")]
    SequenceLength {
        name: String,
        len: usize,
        expected: usize,
    },
    /// No transition matches the given input valuation.
    #[error("no transition from state `{state}` matches the given input valuation")]
    NoMatch { state: String },
    /// A taken transition does not produce a value for an output port.
    #[error("transition from state `{state}` produces no value for output port `{name}`")]
    MissingOutput { state: String, name: String },
    /// More than one transition matches the given input valuation.
    #[error("multiple transitions from state `{state}` match the given input valuation")]
    Ambiguous { state: String },
    /// The default start state cannot be inferred.
    #[error("cannot infer a start state: found {count} candidate(s) instead of exactly one")]
    AmbiguousStart { count: usize },
    /// An interactive-run choice index is out of range.
    #[error("transition choice {index} is out of range, {available} available")]
    BadChoice { index: usize, available: usize },
}

/// Umbrella error for the synthesis entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisFailure),
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}
