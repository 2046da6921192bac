// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend jobs: one external process per job.
//!
//! A [`JobSpec`] describes the command and the resources it needs; a
//! [`Job`] owns the spawned process, its state machine, and the
//! `NAME.out` / `NAME.err` files it writes into its work directory.
//! Jobs are owned by the scheduler; everyone else holds a [`JobHandle`].

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Grace period between SIGTERM and SIGKILL when aborting a job.
const KILL_GRACE: Duration = Duration::from_secs(2);
const KILL_POLL: Duration = Duration::from_millis(50);

/// Immutable description of a command and its resource requirements.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    /// Executable name or path.
    pub command: String,
    /// Ordered argument list.
    pub args: Vec<String>,
    /// Required CPU cores.
    pub cpu: u32,
    /// Required memory in GB.
    pub mem: f64,
    /// Required disk space in GB.
    pub spc: f64,
    /// Maximum wall-clock run time in seconds; 0 means no per-job limit.
    pub tim: u64,
}

impl JobSpec {
    /// Spec for `command` with default requirements (1 cpu, 1 GB memory,
    /// 1 GB disk, no time limit).
    pub fn new(
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            cpu: 1,
            mem: 1.0,
            spc: 1.0,
            tim: 0,
        }
    }

    isoflow_core::setters! {
        set {
            cpu: u32,
            mem: f64,
            spc: f64,
            tim: u64,
        }
    }

    /// Flatten to a JSON value with a nested resources section, the shape
    /// tasks record under `run_info/job` on the blackboard.
    pub fn as_value(&self) -> Value {
        json!({
            "command": self.command,
            "args": self.args,
            "resources": {
                "cpu": self.cpu,
                "mem": self.mem,
                "spc": self.spc,
                "tim": self.tim,
            },
        })
    }
}

/// States a job can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

isoflow_core::simple_display! {
    JobState {
        Queued => "QUEUED",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Shared handle to a scheduler-owned job.
pub type JobHandle = Arc<Mutex<Job>>;

/// One external process: spec, state, exit code, output file locations.
#[derive(Debug)]
pub struct Job {
    name: String,
    spec: JobSpec,
    wdir: PathBuf,
    state: JobState,
    error: Option<String>,
    ret_code: Option<i32>,
    child: Option<Child>,
    deadline: Option<Instant>,
}

impl Job {
    pub(crate) fn new(name: impl Into<String>, spec: JobSpec, wdir: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            spec,
            wdir: wdir.unwrap_or_else(|| PathBuf::from(".")),
            state: JobState::Queued,
            error: None,
            ret_code: None,
            child: None,
            deadline: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Human-readable failure reason; set iff the job is FAILED.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Exit code of the backend; set at the transition out of RUNNING.
    pub fn ret_code(&self) -> Option<i32> {
        self.ret_code
    }

    /// Path of the file collecting the process stdout.
    pub fn stdout_path(&self) -> PathBuf {
        self.wdir.join(format!("{}.out", self.name))
    }

    /// Path of the file collecting the process stderr.
    pub fn stderr_path(&self) -> PathBuf {
        self.wdir.join(format!("{}.err", self.name))
    }

    /// Resolve `path` relative to the job's work directory.
    pub fn file_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.wdir.join(path)
    }

    /// Set up and start a queued job: create the work directory, open the
    /// output files, spawn the process.  Any setup failure transitions
    /// straight to FAILED.
    pub(crate) fn start(&mut self, now: Instant) {
        debug_assert_eq!(self.state, JobState::Queued, "job must be queued to start");
        match self.spawn(now) {
            Ok(child) => {
                tracing::debug!(job = %self.name, pid = child.id(), "job process spawned");
                self.child = Some(child);
                self.state = JobState::Running;
            }
            Err(err) => self.fail(err.to_string()),
        }
    }

    fn spawn(&mut self, now: Instant) -> std::io::Result<Child> {
        std::fs::create_dir_all(&self.wdir)?;
        let stdout = File::create(self.stdout_path())?;
        let stderr = File::create(self.stderr_path())?;
        self.deadline = (self.spec.tim > 0).then(|| now + Duration::from_secs(self.spec.tim));
        let mut command = Command::new(&self.spec.command);
        command
            .args(&self.spec.args)
            .current_dir(&self.wdir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .process_group(0);
        command.spawn()
    }

    /// Check the process and update state; terminate the process if it has
    /// exceeded its allowed run time.  No-op unless RUNNING.
    pub(crate) fn poll(&mut self, now: Instant) -> JobState {
        if self.state != JobState::Running {
            return self.state;
        }
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => {
                let code = status.code().unwrap_or(-1);
                self.ret_code = Some(code);
                self.child = None;
                if code == 0 {
                    self.state = JobState::Completed;
                } else {
                    let log = self.stderr_path().display().to_string();
                    self.fail(format!("backend run failed, check its error log: {log}"));
                }
            }
            Some(Ok(None)) => {
                if self.deadline.is_some_and(|deadline| now > deadline) {
                    let tim = self.spec.tim;
                    self.stop(&format!("job exceeded its allowed run time ({tim}s)"));
                }
            }
            Some(Err(err)) => {
                self.ret_code = Some(-1);
                self.child = None;
                self.fail(format!("job status check failed: {err}"));
            }
            None => {}
        }
        self.state
    }

    /// Dequeue or terminate the job and mark it FAILED.  No-op once
    /// terminal.
    pub(crate) fn stop(&mut self, reason: &str) {
        match self.state {
            JobState::Queued => self.fail(format!("job did not run: {reason}")),
            JobState::Running => {
                if let Some(mut child) = self.child.take() {
                    terminate(&mut child, &self.name);
                }
                self.ret_code = Some(-1);
                self.append_stderr(&format!("Error: job aborted: {reason}\n"));
                self.fail(format!("job aborted: {reason}"));
            }
            JobState::Completed | JobState::Failed => {}
        }
    }

    pub(crate) fn fail(&mut self, error: String) {
        tracing::debug!(job = %self.name, %error, "job failed");
        self.error = Some(error);
        self.state = JobState::Failed;
    }

    fn append_stderr(&self, line: &str) {
        let result = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.stderr_path())
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(err) = result {
            tracing::warn!(job = %self.name, error = %err, "could not append to stderr file");
        }
    }
}

/// Terminate the job's process group: SIGTERM first, SIGKILL after a
/// short grace period, then reap.
fn terminate(child: &mut Child, name: &str) {
    let pgid = Pid::from_raw(child.id() as i32);
    if signal::killpg(pgid, Signal::SIGTERM).is_err() {
        let _ = child.wait();
        return;
    }
    let since = Instant::now();
    while since.elapsed() < KILL_GRACE {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => std::thread::sleep(KILL_POLL),
            Err(_) => break,
        }
    }
    tracing::warn!(job = %name, "process ignored SIGTERM, escalating to SIGKILL");
    let _ = signal::killpg(pgid, Signal::SIGKILL);
    let _ = child.wait();
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
