// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic service shims for `isoflow run`.
//!
//! Services are declared in a TOML file as external commands with their
//! resource needs.  [`CommandShim`] turns such a declaration into one
//! scheduled job, interpolating `${path}` references against the
//! blackboard, and collects the job's stdout as the service result.
//! Services in the rule book with no declaration get the
//! [`UnimplementedShim`], which fails on first report.

use isoflow_engine::{
    JobHandle, JobSpec, ServiceExecution, SharedBoard, SharedScheduler, Shim, Task, TaskError,
    TaskState,
};
use isoflow_core::{Blackboard, Clock};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level shape of the service definition file.
#[derive(Debug, Default, Deserialize)]
pub struct ServiceFile {
    #[serde(default)]
    pub service: BTreeMap<String, ServiceDef>,
}

/// One service declaration: the backend command and its resource needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDef {
    #[serde(default = "default_version")]
    pub version: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub resources: Resources,
}

fn default_version() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub cpu: u32,
    pub mem: f64,
    pub spc: f64,
    pub tim: u64,
}

impl Default for Resources {
    fn default() -> Self {
        Self { cpu: 1, mem: 1.0, spc: 1.0, tim: 0 }
    }
}

/// Shim running one declared external command as a single job.
pub struct CommandShim {
    def: ServiceDef,
    run_dir: PathBuf,
}

impl CommandShim {
    pub fn new(def: ServiceDef, run_dir: impl Into<PathBuf>) -> Self {
        Self { def, run_dir: run_dir.into() }
    }

    fn build_spec(&self, board: &Blackboard) -> Result<JobSpec, TaskError> {
        let args = self
            .def
            .args
            .iter()
            .map(|arg| interpolate(arg, board))
            .collect::<Result<Vec<_>, _>>()?;
        let res = &self.def.resources;
        Ok(JobSpec::new(&self.def.command, args)
            .cpu(res.cpu)
            .mem(res.mem)
            .spc(res.spc)
            .tim(res.tim))
    }
}

impl<C: Clock> Shim<C> for CommandShim {
    fn execute(
        &self,
        sid: &str,
        board: &SharedBoard,
        scheduler: &SharedScheduler<C>,
    ) -> Box<dyn Task> {
        let mut exec = ServiceExecution::new(sid, &self.def.version, sid, Arc::clone(board));

        let spec_result = {
            let b = board.lock();
            self.build_spec(&b)
        };
        let spec = match spec_result {
            Ok(spec) => spec,
            Err(err) => {
                exec.fail_from(&err);
                return Box::new(CommandTask { exec, job: None });
            }
        };
        exec.store_job_spec(&spec);

        let job = match scheduler.lock().schedule_job(sid, spec, Some(self.run_dir.join(sid))) {
            Ok(job) => Some(job),
            Err(err) => {
                exec.fail_from(&TaskError::Backend(err.to_string()));
                None
            }
        };
        Box::new(CommandTask { exec, job })
    }
}

struct CommandTask {
    exec: ServiceExecution,
    job: Option<JobHandle>,
}

impl Task for CommandTask {
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
                match std::fs::read_to_string(job.stdout_path()) {
                    Ok(output) => exec.store_results(parse_output(&output)),
                    Err(err) => {
                        exec.fail_from(&TaskError::Backend(format!(
                            "could not read backend output: {err}"
                        )));
                    }
                }
            }),
            None => self.exec.state(),
        }
    }
}

/// Backend stdout becomes the service result: JSON when it parses,
/// otherwise the raw text.
fn parse_output(output: &str) -> serde_json::Value {
    let trimmed = output.trim();
    serde_json::from_str(trimmed)
        .unwrap_or_else(|_| serde_json::Value::String(trimmed.to_string()))
}

/// Replace `${path}` references with values from the blackboard.
fn interpolate(template: &str, board: &Blackboard) -> Result<String, TaskError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(TaskError::User(format!(
                "unterminated ${{…}} reference in argument: {template}"
            )));
        };
        let path = &after[..end];
        let value = {
            let node = board.get(path).ok_or_else(|| {
                TaskError::User(format!("required input is missing on the blackboard: {path}"))
            })?;
            match node {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        };
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Shim for services declared in the rule book but not in the service
/// file: starts, then fails on first report.
pub struct UnimplementedShim;

impl<C: Clock> Shim<C> for UnimplementedShim {
    fn execute(
        &self,
        sid: &str,
        board: &SharedBoard,
        _scheduler: &SharedScheduler<C>,
    ) -> Box<dyn Task> {
        let exec = ServiceExecution::new("unimplemented", "1.0.0", sid, Arc::clone(board));
        Box::new(UnimplementedTask { exec })
    }
}

struct UnimplementedTask {
    exec: ServiceExecution,
}

impl Task for UnimplementedTask {
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
        if self.exec.state() == TaskState::Started {
            let ident = self.exec.ident().to_string();
            self.exec.fail_from(&TaskError::Skip(format!("service {ident} is not implemented")));
        }
        self.exec.state()
    }
}

#[cfg(test)]
#[path = "shims_tests.rs"]
mod tests;
