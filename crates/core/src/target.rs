// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dependency language: targets, connectors, and rule books.
//!
//! A pipeline is declared as a rule book mapping each target to the clause
//! that must hold before the target is satisfied.  Four kinds of target
//! exist: params flag the presence of user inputs, services are backed by
//! an external program, checkpoints are internal rendezvous points, and
//! user targets are the goals a user may request.
//!
//! Evaluation of a clause is tri-valued: a sub-expression is either
//! unsatisfiable, already satisfied, or pending on a list of services that
//! must run next to make progress.

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// A named node in the dependency graph.
///
/// The carried string is the target's stable identifier, used for display
/// and CLI parsing.  Two targets are equal iff kind and identifier match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    /// Flags the presence of a user-supplied input; cannot be run.
    Param(&'static str),
    /// Internal rendezvous target with no backend of its own.
    Checkpoint(&'static str),
    /// Target implemented by an external program behind a shim.
    Service(&'static str),
    /// Goal the end user may request.
    UserTarget(&'static str),
}

/// Tag-only view of [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Param,
    Checkpoint,
    Service,
    UserTarget,
}

crate::simple_display! {
    TargetKind {
        Param => "param",
        Checkpoint => "checkpoint",
        Service => "service",
        UserTarget => "user target",
    }
}

impl Target {
    /// The target's stable identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Target::Param(name)
            | Target::Checkpoint(name)
            | Target::Service(name)
            | Target::UserTarget(name) => name,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Param(_) => TargetKind::Param,
            Target::Checkpoint(_) => TargetKind::Checkpoint,
            Target::Service(_) => TargetKind::Service,
            Target::UserTarget(_) => TargetKind::UserTarget,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Target::Service(_))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A dependency expression over targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Target(Target),
    /// All clauses must be met, in any order.
    All(Vec<Clause>),
    /// All clauses must be met, in the given order.
    Seq(Vec<Clause>),
    /// At least one clause must be met.
    One(Vec<Clause>),
    /// Like [`Clause::One`], but short-circuits left to right.
    Fst(Vec<Clause>),
    /// The clause is tried but allowed to fail.
    Opt(Box<Clause>),
    /// Succeeds iff the clause succeeds, without triggering its execution.
    Oif(Box<Clause>),
}

impl From<Target> for Clause {
    fn from(target: Target) -> Self {
        Clause::Target(target)
    }
}

/// Shorthand constructors, so rule books read like the dependency tables
/// they encode.
pub fn all<I: Into<Clause>>(clauses: impl IntoIterator<Item = I>) -> Clause {
    Clause::All(clauses.into_iter().map(Into::into).collect())
}

pub fn seq<I: Into<Clause>>(clauses: impl IntoIterator<Item = I>) -> Clause {
    Clause::Seq(clauses.into_iter().map(Into::into).collect())
}

pub fn one<I: Into<Clause>>(clauses: impl IntoIterator<Item = I>) -> Clause {
    Clause::One(clauses.into_iter().map(Into::into).collect())
}

pub fn fst<I: Into<Clause>>(clauses: impl IntoIterator<Item = I>) -> Clause {
    Clause::Fst(clauses.into_iter().map(Into::into).collect())
}

pub fn opt(clause: impl Into<Clause>) -> Clause {
    Clause::Opt(Box::new(clause.into()))
}

pub fn oif(clause: impl Into<Clause>) -> Clause {
    Clause::Oif(Box::new(clause.into()))
}

/// Outcome of evaluating a clause or target against the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eval {
    /// The sub-expression can no longer be satisfied.
    Unsatisfiable,
    /// The sub-expression is already satisfied.
    Satisfied,
    /// These services must run next to make progress (never empty).
    Pending(Vec<Target>),
}

/// Errors raised when assembling a rule book.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("params cannot have dependencies: {0}")]
    ParamRule(Target),
    #[error("duplicate rule for target: {0}")]
    DuplicateRule(Target),
    #[error("no rule is defined for target: {0}")]
    MissingRule(Target),
}

/// The dependency rules of a pipeline: an ordered map from target to the
/// clause that must hold for it.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: IndexMap<Target, Clause>,
}

impl RuleBook {
    /// Build a rule book, rejecting rules keyed on params and duplicates.
    pub fn new(
        rules: impl IntoIterator<Item = (Target, Clause)>,
    ) -> Result<Self, RuleError> {
        let mut map = IndexMap::new();
        for (target, clause) in rules {
            if matches!(target, Target::Param(_)) {
                return Err(RuleError::ParamRule(target));
            }
            if map.insert(target, clause).is_some() {
                return Err(RuleError::DuplicateRule(target));
            }
        }
        Ok(Self { rules: map })
    }

    pub fn get(&self, target: &Target) -> Option<&Clause> {
        self.rules.get(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.rules.keys()
    }

    /// Check that every non-param target in `universe` has a rule.
    pub fn check_complete<'a>(
        &self,
        universe: impl IntoIterator<Item = &'a Target>,
    ) -> Result<(), RuleError> {
        for target in universe {
            if !matches!(target, Target::Param(_)) && !self.rules.contains_key(target) {
                return Err(RuleError::MissingRule(*target));
            }
        }
        Ok(())
    }
}

impl Target {
    /// Evaluate this target against the rule book and the sets of completed
    /// and failed targets.
    ///
    /// A completed target is satisfied; a failed target, or a param that was
    /// not provided, is unsatisfiable.  Otherwise the target's rule decides:
    /// pending prerequisites are returned as-is, and a satisfied rule makes
    /// the target itself the pending service (services only — checkpoints
    /// and user targets are satisfied the moment their rule is).
    pub fn runnables(
        &self,
        rules: &RuleBook,
        completed: &IndexSet<Target>,
        failed: &IndexSet<Target>,
    ) -> Eval {
        if completed.contains(self) {
            return Eval::Satisfied;
        }
        if failed.contains(self) || matches!(self, Target::Param(_)) {
            return Eval::Unsatisfiable;
        }
        let pre = match rules.get(self) {
            Some(clause) => clause.runnables(rules, completed, failed),
            None => Eval::Satisfied,
        };
        match pre {
            Eval::Unsatisfiable => Eval::Unsatisfiable,
            Eval::Pending(services) => Eval::Pending(services),
            Eval::Satisfied if self.is_service() => Eval::Pending(vec![*self]),
            Eval::Satisfied => Eval::Satisfied,
        }
    }
}

impl Clause {
    /// Evaluate this clause; see [`Target::runnables`] for the leaf rules.
    pub fn runnables(
        &self,
        rules: &RuleBook,
        completed: &IndexSet<Target>,
        failed: &IndexSet<Target>,
    ) -> Eval {
        match self {
            Clause::Target(target) => target.runnables(rules, completed, failed),

            // Union of pending services across all clauses, in first-seen
            // order; unsatisfiable as soon as any clause is.
            Clause::All(clauses) => {
                let mut out: Vec<Target> = Vec::new();
                for clause in clauses {
                    match clause.runnables(rules, completed, failed) {
                        Eval::Unsatisfiable => return Eval::Unsatisfiable,
                        Eval::Satisfied => {}
                        Eval::Pending(services) => {
                            for service in services {
                                if !out.contains(&service) {
                                    out.push(service);
                                }
                            }
                        }
                    }
                }
                if out.is_empty() {
                    Eval::Satisfied
                } else {
                    Eval::Pending(out)
                }
            }

            // Pending services of the first clause that has any; every
            // clause must remain satisfiable.
            Clause::Seq(clauses) => {
                let mut first: Option<Vec<Target>> = None;
                for clause in clauses {
                    match clause.runnables(rules, completed, failed) {
                        Eval::Unsatisfiable => return Eval::Unsatisfiable,
                        Eval::Satisfied => {}
                        Eval::Pending(services) => {
                            if first.is_none() {
                                first = Some(services);
                            }
                        }
                    }
                }
                match first {
                    Some(services) => Eval::Pending(services),
                    None => Eval::Satisfied,
                }
            }

            // Satisfied if any clause is; else pending on the first clause
            // that still can be satisfied; unsatisfiable if none can.
            Clause::One(clauses) => {
                let mut first: Option<Vec<Target>> = None;
                for clause in clauses {
                    match clause.runnables(rules, completed, failed) {
                        Eval::Satisfied => return Eval::Satisfied,
                        Eval::Pending(services) => {
                            if first.is_none() {
                                first = Some(services);
                            }
                        }
                        Eval::Unsatisfiable => {}
                    }
                }
                match first {
                    Some(services) => Eval::Pending(services),
                    None => Eval::Unsatisfiable,
                }
            }

            // Left to right, the first clause that is not unsatisfiable
            // supplies the outcome; later clauses are not consulted.
            Clause::Fst(clauses) => {
                for clause in clauses {
                    match clause.runnables(rules, completed, failed) {
                        Eval::Unsatisfiable => {}
                        other => return other,
                    }
                }
                Eval::Unsatisfiable
            }

            // Failure of the clause is absorbed.
            Clause::Opt(clause) => match clause.runnables(rules, completed, failed) {
                Eval::Unsatisfiable => Eval::Satisfied,
                other => other,
            },

            // Succeeds only if the clause is satisfied without triggering
            // its own execution here.
            Clause::Oif(clause) => match clause.runnables(rules, completed, failed) {
                Eval::Satisfied => Eval::Satisfied,
                _ => Eval::Unsatisfiable,
            },
        }
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
