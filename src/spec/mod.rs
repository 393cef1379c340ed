//! GR(1) specification fragments.
//!
//! A [`GrSpec`] declares environment and system variables over finite
//! domains and collects initial, safety and progress constraints as
//! propositional predicates. Temporal structure is implicit in where a
//! predicate is stored: safety predicates may mention primed variables
//! (a trailing `'` on the name) to refer to the next step.

use std::collections::BTreeMap;
use std::fmt;

use crate::graph::{AttrMap, AttrValue, Domain};

/// The finite domain of a specification variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarDomain {
    Boolean,
    /// Integers in the inclusive range.
    Range(i64, i64),
    /// An enumeration; solver back-ends encode values by list position.
    Enum(Vec<String>),
}

impl VarDomain {
    /// The port domain induced by this variable: boolean variables
    /// become `{0, 1}` ports, ranges become integer sets, enumerations
    /// become string sets.
    pub fn to_port_domain(&self) -> Domain {
        match self {
            VarDomain::Boolean => Domain::Explicit(
                [AttrValue::Int(0), AttrValue::Int(1)].iter().cloned().collect(),
            ),
            VarDomain::Range(lo, hi) => {
                Domain::Explicit((*lo..=*hi).map(AttrValue::Int).collect())
            }
            VarDomain::Enum(values) => Domain::Explicit(
                values.iter().map(|v| AttrValue::Str(v.clone())).collect(),
            ),
        }
    }

    /// Decode a solver-side integer code into an attribute value.
    ///
    /// Booleans and ranges carry their value directly; enumerations are
    /// coded by list position. Returns `None` for a code outside the
    /// domain.
    pub fn decode(&self, code: i64) -> Option<AttrValue> {
        match self {
            VarDomain::Boolean => {
                if code == 0 || code == 1 {
                    Some(AttrValue::Int(code))
                } else {
                    None
                }
            }
            VarDomain::Range(lo, hi) => {
                if *lo <= code && code <= *hi {
                    Some(AttrValue::Int(code))
                } else {
                    None
                }
            }
            VarDomain::Enum(values) => {
                if code >= 0 && (code as usize) < values.len() {
                    Some(AttrValue::Str(values[code as usize].clone()))
                } else {
                    None
                }
            }
        }
    }
}

/// Returns the primed (next-step) name of a variable.
pub fn prime(name: &str) -> String {
    format!("{}'", name)
}

/// A propositional predicate over variable valuations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pred {
    True,
    False,
    /// A boolean variable holds (its value is `1`).
    Var(String),
    /// A variable equals the given value.
    Eq(String, AttrValue),
    Not(Box<Pred>),
    And(Vec<Pred>),
    Or(Vec<Pred>),
}

impl Pred {
    /// Evaluate against a valuation. A variable missing from the
    /// valuation makes `Var` and `Eq` false.
    pub fn eval(&self, valuation: &AttrMap) -> bool {
        match self {
            Pred::True => true,
            Pred::False => false,
            Pred::Var(name) => valuation.get(name) == Some(&AttrValue::Int(1)),
            Pred::Eq(name, value) => valuation.get(name) == Some(value),
            Pred::Not(inner) => !inner.eval(valuation),
            Pred::And(parts) => parts.iter().all(|p| p.eval(valuation)),
            Pred::Or(parts) => parts.iter().any(|p| p.eval(valuation)),
        }
    }

    /// `lhs -> rhs` as a disjunction.
    pub fn implies(lhs: Pred, rhs: Pred) -> Pred {
        Pred::Or(vec![Pred::Not(Box::new(lhs)), rhs])
    }
}

fn fmt_joined(f: &mut fmt::Formatter, parts: &[Pred], op: &str, empty: &str) -> fmt::Result {
    if parts.is_empty() {
        return write!(f, "{}", empty);
    }
    write!(f, "(")?;
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", p)?;
    }
    write!(f, ")")
}

impl fmt::Display for Pred {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pred::True => write!(f, "true"),
            Pred::False => write!(f, "false"),
            Pred::Var(name) => write!(f, "{}", name),
            Pred::Eq(name, value) => write!(f, "({} = {})", name, value),
            Pred::Not(inner) => write!(f, "!{}", inner),
            Pred::And(parts) => fmt_joined(f, parts, "&&", "true"),
            Pred::Or(parts) => fmt_joined(f, parts, "||", "false"),
        }
    }
}

/// A GR(1) specification fragment.
///
/// `env_*` lists constrain the environment, `sys_*` lists the system.
/// Safety lists may use primed names; init and progress lists may not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrSpec {
    pub env_vars: BTreeMap<String, VarDomain>,
    pub sys_vars: BTreeMap<String, VarDomain>,
    pub env_init: Vec<Pred>,
    pub sys_init: Vec<Pred>,
    pub env_safety: Vec<Pred>,
    pub sys_safety: Vec<Pred>,
    pub env_prog: Vec<Pred>,
    pub sys_prog: Vec<Pred>,
}

impl GrSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variable domain lookup across both sides.
    pub fn var_domain(&self, name: &str) -> Option<&VarDomain> {
        self.env_vars.get(name).or_else(|| self.sys_vars.get(name))
    }

    /// Conjoin another fragment into this one. Variable declarations
    /// are merged; a re-declaration overwrites.
    pub fn merge(&mut self, other: GrSpec) {
        self.env_vars.extend(other.env_vars);
        self.sys_vars.extend(other.sys_vars);
        self.env_init.extend(other.env_init);
        self.sys_init.extend(other.sys_init);
        self.env_safety.extend(other.env_safety);
        self.sys_safety.extend(other.sys_safety);
        self.env_prog.extend(other.env_prog);
        self.sys_prog.extend(other.sys_prog);
    }

    /// Compile the conjunction of all initial constraints into a
    /// reusable predicate over unprimed valuations.
    pub fn compile_init(&self) -> CompiledPredicate {
        let clauses = self
            .env_init
            .iter()
            .chain(self.sys_init.iter())
            .cloned()
            .collect();
        CompiledPredicate { clauses }
    }
}

/// A compiled conjunction of predicates, evaluated as a unit.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    clauses: Vec<Pred>,
}

impl CompiledPredicate {
    /// True when every clause holds under the valuation. The empty
    /// conjunction is satisfied by everything.
    pub fn satisfied_by(&self, valuation: &AttrMap) -> bool {
        self.clauses.iter().all(|p| p.eval(valuation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(pairs: &[(&str, AttrValue)]) -> AttrMap {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn test_pred_eval() {
        let p = Pred::And(vec![
            Pred::Var("go".to_owned()),
            Pred::Not(Box::new(Pred::Eq(
                "loc".to_owned(),
                AttrValue::Str("red".to_owned()),
            ))),
        ]);
        assert!(p.eval(&val(&[
            ("go", AttrValue::Int(1)),
            ("loc", AttrValue::Str("green".to_owned())),
        ])));
        assert!(!p.eval(&val(&[
            ("go", AttrValue::Int(1)),
            ("loc", AttrValue::Str("red".to_owned())),
        ])));
        // Missing variables fall out as false.
        assert!(!p.eval(&val(&[("loc", AttrValue::Str("green".to_owned()))])));
    }

    #[test]
    fn test_decode() {
        let d = VarDomain::Enum(vec!["red".to_owned(), "green".to_owned()]);
        assert_eq!(d.decode(1), Some(AttrValue::Str("green".to_owned())));
        assert_eq!(d.decode(2), None);
        assert_eq!(VarDomain::Range(2, 5).decode(2), Some(AttrValue::Int(2)));
        assert_eq!(VarDomain::Range(2, 5).decode(6), None);
        assert_eq!(VarDomain::Boolean.decode(2), None);
    }

    #[test]
    fn test_merge_fragments() {
        let mut base = GrSpec::new();
        base.env_vars.insert("up".to_owned(), VarDomain::Boolean);
        base.env_init.push(Pred::Var("up".to_owned()));

        let mut extra = GrSpec::new();
        extra
            .sys_vars
            .insert("loc".to_owned(), VarDomain::Enum(vec!["a".to_owned()]));
        extra.sys_init.push(Pred::Eq(
            "loc".to_owned(),
            AttrValue::Str("a".to_owned()),
        ));
        extra.sys_safety.push(Pred::True);

        base.merge(extra);
        assert_eq!(base.var_domain("up"), Some(&VarDomain::Boolean));
        assert_eq!(
            base.var_domain("loc"),
            Some(&VarDomain::Enum(vec!["a".to_owned()]))
        );
        assert_eq!(base.var_domain("ghost"), None);
        assert_eq!(base.sys_safety.len(), 1);
        // The merged initial condition conjoins both fragments.
        let init = base.compile_init();
        assert!(init.satisfied_by(&val(&[
            ("up", AttrValue::Int(1)),
            ("loc", AttrValue::Str("a".to_owned())),
        ])));
        assert!(!init.satisfied_by(&val(&[("up", AttrValue::Int(1))])));
    }

    #[test]
    fn test_compile_init_conjunction() {
        let mut spec = GrSpec::new();
        spec.sys_vars.insert("go".to_owned(), VarDomain::Boolean);
        spec.env_init.push(Pred::Var("up".to_owned()));
        spec.sys_init.push(Pred::Not(Box::new(Pred::Var("go".to_owned()))));
        let init = spec.compile_init();
        assert!(init.satisfied_by(&val(&[
            ("up", AttrValue::Int(1)),
            ("go", AttrValue::Int(0)),
        ])));
        assert!(!init.satisfied_by(&val(&[
            ("up", AttrValue::Int(1)),
            ("go", AttrValue::Int(1)),
        ])));
        // Empty conjunction accepts anything.
        assert!(GrSpec::new().compile_init().satisfied_by(&AttrMap::new()));
    }
}
