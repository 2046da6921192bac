// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service execution handles.
//!
//! A [`Task`] is what a shim hands back to the executor: a polymorphic
//! handle that drives one or more jobs and lifts their outcome onto the
//! blackboard.  [`ServiceExecution`] carries the state shared by every
//! task: the identity, the STARTED/COMPLETED/FAILED transitions, and the
//! `services/<ident>/…` bookkeeping on the blackboard.

use crate::executor::SharedBoard;
use crate::job::{Job, JobHandle, JobSpec, JobState};
use serde_json::Value;
use thiserror::Error;

/// States a service execution can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Started,
    Completed,
    Failed,
}

isoflow_core::simple_display! {
    TaskState {
        Started => "STARTED",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

/// Why a service execution failed, for reporting purposes.
///
/// User errors are caused by the user's inputs or environment and are
/// reported without operator noise.  Skip means the service does not apply
/// in this context; parents normally wrap such services in `OPT`, so the
/// workflow shrugs it off.  Backend errors are the real failures and get
/// logged in full for the operator.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    User(String),
    #[error("{0}")]
    Skip(String),
    #[error("{0}")]
    Backend(String),
}

/// Execution handle returned by a shim.  One task per service per
/// workflow run; the executor owns it and polls `report` until it leaves
/// STARTED.
pub trait Task {
    fn ident(&self) -> &str;
    fn state(&self) -> TaskState;
    /// Failure reason; set iff the state is FAILED.
    fn error(&self) -> Option<&str>;
    /// Non-blocking: inspect the owned jobs and update state accordingly.
    fn report(&mut self) -> TaskState;
}

/// Common state for service executions.
///
/// Construction registers the run info on the blackboard under
/// `services/<ident>/run_info/` and transitions to STARTED; `done` and
/// `fail` are the two terminal transitions.  Every transition records
/// status and timestamps, and failures are appended to the service's
/// error list.
pub struct ServiceExecution {
    ident: String,
    state: TaskState,
    error: Option<String>,
    board: SharedBoard,
}

impl ServiceExecution {
    pub fn new(service: &str, version: &str, ident: &str, board: SharedBoard) -> Self {
        let mut execution =
            Self { ident: ident.to_string(), state: TaskState::Started, error: None, board };
        execution.put_run_info("service", service);
        execution.put_run_info("version", version);
        execution.transition(TaskState::Started, None);
        execution
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn board(&self) -> &SharedBoard {
        &self.board
    }

    pub fn put_run_info(&self, path: &str, value: impl Into<Value>) {
        let ident = &self.ident;
        self.board.lock().put(&format!("services/{ident}/run_info/{path}"), value);
    }

    pub fn get_run_info(&self, path: &str) -> Option<Value> {
        let ident = &self.ident;
        self.board.lock().get(&format!("services/{ident}/run_info/{path}")).cloned()
    }

    /// Record the spec of a scheduled job under `run_info/job`.
    pub fn store_job_spec(&self, spec: &JobSpec) {
        self.put_run_info("job", spec.as_value());
    }

    /// Store the service results under `services/<ident>/results`.
    pub fn store_results(&self, results: impl Into<Value>) {
        let ident = &self.ident;
        self.board.lock().put(&format!("services/{ident}/results"), results);
    }

    /// Append a warning to the service's warning list (kept unique).
    pub fn add_warning(&self, warning: impl Into<Value>) {
        let ident = &self.ident;
        self.board.lock().append_to(&format!("services/{ident}/warnings"), warning, true);
    }

    pub fn add_error(&self, error: impl Into<Value>) {
        let ident = &self.ident;
        self.board.lock().append_to(&format!("services/{ident}/errors"), error, false);
    }

    /// Mark this execution COMPLETED.
    pub fn done(&mut self) -> TaskState {
        self.transition(TaskState::Completed, None)
    }

    /// Transition to FAILED with the given error message.
    pub fn fail(&mut self, error: impl Into<String>) -> TaskState {
        self.transition(TaskState::Failed, Some(error.into()))
    }

    /// Fail from a categorised error.  User and skip conditions carry
    /// only their message; backend errors are additionally logged for the
    /// operator.
    pub fn fail_from(&mut self, error: &TaskError) -> TaskState {
        match error {
            TaskError::User(_) | TaskError::Skip(_) => {}
            TaskError::Backend(detail) => {
                tracing::error!(service = %self.ident, error = %detail, "service backend error");
            }
        }
        self.fail(error.to_string())
    }

    fn transition(&mut self, state: TaskState, error: Option<String>) -> TaskState {
        debug_assert!(
            state != TaskState::Failed || error.is_some(),
            "a FAILED execution must set its error"
        );
        self.state = state;
        self.error = if state == TaskState::Failed { error } else { None };

        let now = chrono::Local::now();
        let stamp = now.format("%Y-%m-%dT%H:%M:%S").to_string();
        if state == TaskState::Started {
            self.put_run_info("time/start", stamp);
        } else {
            if let Some(started) = self
                .get_run_info("time/start")
                .as_ref()
                .and_then(Value::as_str)
                .and_then(|s| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
            {
                let duration = (now.naive_local() - started).num_seconds();
                self.put_run_info("time/duration", duration);
            }
            self.put_run_info("time/end", stamp);
        }

        self.put_run_info("status", state.to_string());
        if state == TaskState::Failed {
            if let Some(error) = self.error.clone() {
                self.add_error(error);
            }
        }
        state
    }

    /// Default report flow for a task owning a single job.
    ///
    /// A COMPLETED job has `collect` lift its outputs onto the blackboard
    /// (which may itself fail the execution); a FAILED job propagates its
    /// error; a RUNNING job changes nothing.
    pub fn report_job(
        &mut self,
        job: &JobHandle,
        collect: impl FnOnce(&mut ServiceExecution, &Job),
    ) -> TaskState {
        if self.state == TaskState::Started {
            let j = job.lock();
            match j.state() {
                JobState::Completed => {
                    collect(self, &j);
                    if self.state != TaskState::Failed {
                        self.done();
                    }
                }
                JobState::Failed => {
                    let error = j.error().unwrap_or("job failed").to_string();
                    drop(j);
                    self.fail(error);
                }
                JobState::Queued | JobState::Running => {}
            }
        }
        self.state
    }

    /// Report flow for a task fanning out over several parallel jobs.
    ///
    /// Waits until all jobs are terminal, collects the output of each
    /// successful one, and completes iff at least one succeeded.
    pub fn report_job_fanout(
        &mut self,
        jobs: &[JobHandle],
        label: &str,
        mut collect: impl FnMut(&mut ServiceExecution, &Job),
    ) -> TaskState {
        if self.state == TaskState::Started
            && jobs.iter().all(|job| job.lock().state().is_terminal())
        {
            let mut succeeded = 0;
            for job in jobs {
                let j = job.lock();
                if j.state() == JobState::Completed {
                    collect(self, &j);
                    succeeded += 1;
                } else if let Some(error) = j.error() {
                    self.add_warning(error);
                }
            }
            if self.state != TaskState::Failed {
                if succeeded > 0 {
                    self.done();
                } else {
                    self.fail(format!("no successful {label} job"));
                }
            }
        }
        self.state
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
