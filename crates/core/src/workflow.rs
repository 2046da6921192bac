// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow state machine.
//!
//! A [`Workflow`] binds a rule book to one pipeline run: the params that
//! were provided, the user targets that were requested, and the targets
//! that were excluded up front.  It tracks which services have been
//! started, completed, and failed, and after every change recomputes the
//! list of currently runnable services and the overall status.

use crate::target::{Clause, Eval, RuleBook, Target};
use indexmap::IndexSet;
use thiserror::Error;

/// Overall status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// At least one service is runnable right now.
    Runnable,
    /// Nothing is runnable, but started services may unlock more work.
    Waiting,
    /// All requested targets have been attained.
    Completed,
    /// A requested target can no longer be attained.
    Failed,
}

crate::simple_display! {
    Status {
        Runnable => "RUNNABLE",
        Waiting => "WAITING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("not a param target: {0}")]
    NotAParam(Target),
    #[error("not a user target: {0}")]
    NotAUserTarget(Target),
    #[error("only services and user targets can be excluded: {0}")]
    NotExcludable(Target),
    #[error("service is not runnable: {0}")]
    NotRunnable(Target),
    #[error("service was not runnable or started: {0}")]
    NotActive(Target),
}

/// State of one workflow run.
#[derive(Debug)]
pub struct Workflow {
    rules: RuleBook,
    /// `ALL` over the requested user targets; evaluating it yields the
    /// runnable services in deterministic pre-order.
    goal: Clause,
    started: IndexSet<Target>,
    completed: IndexSet<Target>,
    failed: IndexSet<Target>,
    runnable: Vec<Target>,
    status: Status,
}

impl Workflow {
    /// Construct a workflow for one run.
    ///
    /// `params` flag the provided inputs, `targets` are the requested
    /// goals, and `excludes` names services or user targets that must not
    /// run (they count as failed from the start).
    pub fn new(
        rules: RuleBook,
        params: impl IntoIterator<Item = Target>,
        targets: impl IntoIterator<Item = Target>,
        excludes: impl IntoIterator<Item = Target>,
    ) -> Result<Self, WorkflowError> {
        let mut completed = IndexSet::new();
        for param in params {
            if !matches!(param, Target::Param(_)) {
                return Err(WorkflowError::NotAParam(param));
            }
            completed.insert(param);
        }
        let mut goal = Vec::new();
        for target in targets {
            if !matches!(target, Target::UserTarget(_)) {
                return Err(WorkflowError::NotAUserTarget(target));
            }
            goal.push(Clause::from(target));
        }
        let mut failed = IndexSet::new();
        for exclude in excludes {
            if !matches!(exclude, Target::Service(_) | Target::UserTarget(_)) {
                return Err(WorkflowError::NotExcludable(exclude));
            }
            failed.insert(exclude);
        }
        let mut workflow = Self {
            rules,
            goal: Clause::All(goal),
            started: IndexSet::new(),
            completed,
            failed,
            runnable: Vec::new(),
            status: Status::Completed,
        };
        workflow.reassess();
        Ok(workflow)
    }

    /// Recompute the runnable list and status from the current state sets.
    fn reassess(&mut self) {
        let pending = match self.goal.runnables(&self.rules, &self.completed, &self.failed) {
            Eval::Unsatisfiable => {
                self.runnable.clear();
                self.status = Status::Failed;
                return;
            }
            Eval::Satisfied => Vec::new(),
            Eval::Pending(services) => services,
        };
        self.runnable =
            pending.into_iter().filter(|service| !self.started.contains(service)).collect();
        self.status = if !self.runnable.is_empty() {
            Status::Runnable
        } else if self.started.is_empty() {
            Status::Completed
        } else {
            Status::Waiting
        };
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Currently runnable (but not started) services, in evaluation order.
    pub fn list_runnable(&self) -> &[Target] {
        &self.runnable
    }

    /// Services that have been started and not yet resolved.
    pub fn list_started(&self) -> Vec<Target> {
        self.started.iter().copied().collect()
    }

    /// Successfully completed services (params are not reported).
    pub fn list_completed(&self) -> Vec<Target> {
        self.completed.iter().copied().filter(Target::is_service).collect()
    }

    /// Failed or excluded services.
    pub fn list_failed(&self) -> Vec<Target> {
        self.failed.iter().copied().filter(Target::is_service).collect()
    }

    /// Mark a runnable service as started.  Idempotent for services that
    /// are already started.
    pub fn mark_started(&mut self, service: Target) -> Result<(), WorkflowError> {
        if self.runnable.contains(&service) {
            self.runnable.retain(|s| *s != service);
            self.started.insert(service);
            self.reassess();
            Ok(())
        } else if self.started.contains(&service) {
            Ok(())
        } else {
            Err(WorkflowError::NotRunnable(service))
        }
    }

    /// Mark a runnable or started service as completed.
    pub fn mark_completed(&mut self, service: Target) -> Result<(), WorkflowError> {
        self.take_active(service)?;
        self.completed.insert(service);
        self.reassess();
        Ok(())
    }

    /// Mark a runnable or started service as failed.
    pub fn mark_failed(&mut self, service: Target) -> Result<(), WorkflowError> {
        self.take_active(service)?;
        self.failed.insert(service);
        self.reassess();
        Ok(())
    }

    fn take_active(&mut self, service: Target) -> Result<(), WorkflowError> {
        if self.runnable.contains(&service) {
            self.runnable.retain(|s| *s != service);
            Ok(())
        } else if self.started.shift_remove(&service) {
            Ok(())
        } else {
            Err(WorkflowError::NotActive(service))
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
