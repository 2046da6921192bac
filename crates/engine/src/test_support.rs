// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted shims and tasks for executor tests.

use crate::executor::{SharedBoard, SharedScheduler};
use crate::job::{JobHandle, JobSpec};
use crate::shim::Shim;
use crate::task::{ServiceExecution, Task, TaskState};
use isoflow_core::Clock;
use std::path::PathBuf;
use std::sync::Arc;

/// Task around a [`ServiceExecution`] and at most one job.
pub struct ScriptedTask {
    exec: ServiceExecution,
    job: Option<JobHandle>,
}

impl Task for ScriptedTask {
    fn ident(&self) -> &str {
        self.exec.ident()
    }

    fn state(&self) -> TaskState {
        self.exec.state()
    }

    fn error(&self) -> Option<&str> {
        self.exec.error()
    }

    fn report(&mut self) -> TaskState {
        match &self.job {
            Some(job) => self.exec.report_job(job, |exec, job| {
                let out = std::fs::read_to_string(job.stdout_path()).unwrap_or_default();
                exec.store_results(out.trim());
            }),
            None => self.exec.state(),
        }
    }
}

/// Shim that resolves immediately, without scheduling any job.
pub struct InstantShim {
    error: Option<String>,
}

impl InstantShim {
    pub fn completing() -> Self {
        Self { error: None }
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()) }
    }
}

impl<C: Clock> Shim<C> for InstantShim {
    fn execute(
        &self,
        sid: &str,
        board: &SharedBoard,
        _scheduler: &SharedScheduler<C>,
    ) -> Box<dyn Task> {
        let mut exec = ServiceExecution::new(sid, "test", sid, Arc::clone(board));
        match &self.error {
            Some(error) => exec.fail(error.clone()),
            None => exec.done(),
        };
        Box::new(ScriptedTask { exec, job: None })
    }
}

/// Shim that schedules one `/bin/sh -c` job and collects its stdout.
pub struct ShellShim {
    script: String,
    base_dir: PathBuf,
}

impl ShellShim {
    pub fn new(script: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self { script: script.into(), base_dir: base_dir.into() }
    }
}

impl<C: Clock> Shim<C> for ShellShim {
    fn execute(
        &self,
        sid: &str,
        board: &SharedBoard,
        scheduler: &SharedScheduler<C>,
    ) -> Box<dyn Task> {
        let mut exec = ServiceExecution::new(sid, "test", sid, Arc::clone(board));
        let spec = JobSpec::new("/bin/sh", ["-c", self.script.as_str()]);
        exec.store_job_spec(&spec);
        let job = match scheduler.lock().schedule_job(sid, spec, Some(self.base_dir.join(sid))) {
            Ok(job) => Some(job),
            Err(err) => {
                exec.fail(err.to_string());
                None
            }
        };
        Box::new(ScriptedTask { exec, job })
    }
}

/// Shim whose task claims STARTED but never owns a job: the executor must
/// detect the resulting workflow/scheduler inconsistency.
pub struct StuckShim;

impl<C: Clock> Shim<C> for StuckShim {
    fn execute(
        &self,
        sid: &str,
        board: &SharedBoard,
        _scheduler: &SharedScheduler<C>,
    ) -> Box<dyn Task> {
        let exec = ServiceExecution::new(sid, "test", sid, Arc::clone(board));
        Box::new(ScriptedTask { exec, job: None })
    }
}
