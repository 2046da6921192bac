// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow executor: runs a workflow from start to end.
//!
//! The executor asks the workflow for runnable services, dispatches their
//! shims, and blocks on the scheduler until jobs change state.  Whenever
//! a task leaves STARTED, the outcome is reflected back into the
//! workflow, which recomputes what is runnable next.  The loop ends when
//! the workflow is COMPLETED or FAILED.

use crate::scheduler::Scheduler;
use crate::shim::Shim;
use crate::task::{Task, TaskState};
use indexmap::IndexMap;
use isoflow_core::{Blackboard, Clock, Status, Target, Workflow, WorkflowError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Blackboard shared between the executor and the shims.
pub type SharedBoard = Arc<Mutex<Blackboard>>;
/// Scheduler shared between the executor and the shims.
pub type SharedScheduler<C> = Arc<Mutex<Scheduler<C>>>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("no implementation for service: {0}")]
    NoShim(Target),
    #[error("no services were started yet the workflow is waiting")]
    PrematureWait,
    #[error("fatal inconsistency between workflow and scheduler")]
    SchedulerMismatch,
    #[error("fatal inconsistency between workflow and executions: {0}")]
    CrossCheck(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Drives one workflow run using a set of service shims and a scheduler.
pub struct Executor<C: Clock> {
    workflow: Workflow,
    services: HashMap<Target, Box<dyn Shim<C>>>,
    scheduler: SharedScheduler<C>,
    executions: IndexMap<Target, Box<dyn Task>>,
}

impl<C: Clock> Executor<C> {
    pub fn new(
        workflow: Workflow,
        services: HashMap<Target, Box<dyn Shim<C>>>,
        scheduler: SharedScheduler<C>,
    ) -> Self {
        Self { workflow, services, scheduler, executions: IndexMap::new() }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Execute the workflow to completion and return its final status.
    pub fn execute(&mut self, board: &SharedBoard) -> Result<Status, ExecutorError> {
        board.lock().log("execution starting");

        let mut status = self.workflow.status();
        board.lock().log(format!("workflow status: {status}"));
        if status == Status::Waiting {
            // Freshly constructed: nothing can have been started yet.
            return Err(ExecutorError::PrematureWait);
        }

        while matches!(status, Status::Runnable | Status::Waiting) {
            self.cross_check()?;
            let mut more_jobs = true;

            if let Some(&sid) = self.workflow.list_runnable().first() {
                self.start_service(sid, board)?;
            } else {
                // Nothing runnable: wait on the scheduler, then bring every
                // started execution up to date.
                more_jobs = self.scheduler.lock().listen();
                let started: Vec<Target> = self
                    .executions
                    .iter()
                    .filter(|(_, task)| task.state() == TaskState::Started)
                    .map(|(sid, _)| *sid)
                    .collect();
                for sid in started {
                    self.poll_service(sid, board)?;
                }
            }

            let new_status = self.workflow.status();
            if new_status != status {
                board.lock().log(format!("workflow status: {new_status}"));
            }
            status = new_status;

            // If the scheduler has no more jobs but the workflow still
            // waits, we would spin forever: a rule book bug, caught here.
            if !more_jobs && status == Status::Waiting {
                return Err(ExecutorError::SchedulerMismatch);
            }
        }

        let done = join(&self.workflow.list_completed());
        let failed = join(&self.workflow.list_failed());
        let mut b = board.lock();
        b.log("workflow execution completed");
        b.log(format!("- done: {done}"));
        b.log(format!("- failed/excluded: {failed}"));

        Ok(status)
    }

    /// Dispatch the shim for a runnable service and record its execution.
    fn start_service(&mut self, sid: Target, board: &SharedBoard) -> Result<(), ExecutorError> {
        let shim = self.services.get(&sid).ok_or(ExecutorError::NoShim(sid))?;
        board.lock().log(format!("service start: {sid}"));
        tracing::info!(service = %sid, "service starting");

        let task = shim.execute(sid.name(), board, &self.scheduler);
        let state = task.state();
        self.executions.insert(sid, task);
        self.update_state(sid, state, board)
    }

    /// Non-blocking check whether a started execution has resolved.
    fn poll_service(&mut self, sid: Target, board: &SharedBoard) -> Result<(), ExecutorError> {
        let Some(task) = self.executions.get_mut(&sid) else {
            return Ok(());
        };
        let old = task.state();
        let new = task.report();
        if new != old {
            self.update_state(sid, new, board)?;
        }
        Ok(())
    }

    /// Reflect a task state into the workflow.
    fn update_state(
        &mut self,
        sid: Target,
        state: TaskState,
        board: &SharedBoard,
    ) -> Result<(), ExecutorError> {
        board.lock().log(format!("service state: {sid} {state}"));
        match state {
            TaskState::Started => self.workflow.mark_started(sid)?,
            TaskState::Completed => self.workflow.mark_completed(sid)?,
            TaskState::Failed => {
                if let Some(error) = self.executions.get(&sid).and_then(|task| task.error()) {
                    tracing::warn!(service = %sid, %error, "service failed");
                }
                self.workflow.mark_failed(sid)?;
            }
        }
        Ok(())
    }

    /// Check that the workflow's state sets and our executions agree.
    fn cross_check(&self) -> Result<(), ExecutorError> {
        let mismatch = |msg: String| Err(ExecutorError::CrossCheck(msg));

        for sid in self.workflow.list_runnable() {
            if self.executions.contains_key(sid) {
                return mismatch(format!("runnable service already executed: {sid}"));
            }
        }
        for sid in self.workflow.list_started() {
            match self.executions.get(&sid).map(|task| task.state()) {
                Some(TaskState::Started) => {}
                other => return mismatch(format!("started service is {other:?}: {sid}")),
            }
        }
        for sid in self.workflow.list_failed() {
            if let Some(task) = self.executions.get(&sid) {
                if task.state() != TaskState::Failed {
                    return mismatch(format!("failed service has live execution: {sid}"));
                }
            }
        }
        for sid in self.workflow.list_completed() {
            if let Some(task) = self.executions.get(&sid) {
                if task.state() != TaskState::Completed {
                    return mismatch(format!("completed service has live execution: {sid}"));
                }
            }
        }
        for (sid, task) in &self.executions {
            let listed = match task.state() {
                TaskState::Started => self.workflow.list_started().contains(sid),
                TaskState::Completed => self.workflow.list_completed().contains(sid),
                TaskState::Failed => self.workflow.list_failed().contains(sid),
            };
            if !listed {
                return mismatch(format!("execution not tracked by workflow: {sid}"));
            }
        }
        Ok(())
    }
}

fn join(services: &[Target]) -> String {
    if services.is_empty() {
        "(none)".to_string()
    } else {
        services.iter().map(Target::name).collect::<Vec<_>>().join(", ")
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
