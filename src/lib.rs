//! Toolkit for GR(1) reactive synthesis plumbing: labeled graphs,
//! automata, game graphs, transition systems, synchronous products and
//! the conversion of solver strategies into executable Mealy/Moore
//! transducers, with a guided/random/interactive simulation engine.
//!
//! Solving the GR(1) game itself is delegated to an external back-end
//! behind [`solver::Gr1Solver`]; this crate turns its strategy into a
//! well-formed, input-deterministic controller and drives it.

pub mod automaton;
pub mod error;
pub mod game;
pub mod graph;
pub mod machine;
pub mod product;
pub mod solver;
pub mod spec;
pub mod transys;

use std::fmt;

use log::info;

pub use crate::error::Error;
use crate::machine::{strategy_to_mealy, MachineState, MealyMachine};
use crate::solver::Gr1Solver;
use crate::spec::GrSpec;

/// Realizability verdict for a specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Realizable,
    Unrealizable,
}

impl Status {
    pub fn of(realizable: bool) -> Self {
        if realizable {
            Status::Realizable
        } else {
            Status::Unrealizable
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Realizable => write!(f, "REALIZABLE"),
            Status::Unrealizable => write!(f, "UNREALIZABLE"),
        }
    }
}

/// Synthesize a controller for `spec` with the given solver back-end.
///
/// Returns `Ok(None)` when the specification is unrealizable; that is
/// an expected outcome, not an error. On success the solver's strategy
/// is converted to a Mealy machine and pruned of deadend states.
pub fn synthesize<S: Gr1Solver>(
    solver: &S,
    spec: &GrSpec,
) -> Result<Option<MealyMachine<MachineState>>, Error> {
    match solver.synthesize(spec) {
        None => {
            info!("specification is unrealizable");
            Ok(None)
        }
        Some(strategy) => {
            let mut machine = strategy_to_mealy(&strategy, spec)?;
            machine.remove_deadends();
            info!(
                "synthesized controller with {} state(s)",
                machine.num_states()
            );
            Ok(Some(machine))
        }
    }
}

/// Decide realizability of `spec` without building a controller.
pub fn check_realizable<S: Gr1Solver>(solver: &S, spec: &GrSpec) -> bool {
    let realizable = solver.check_realizable(spec);
    info!("specification is {}", Status::of(realizable));
    realizable
}
