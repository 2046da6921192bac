// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource-constrained subprocess scheduler.
//!
//! The scheduler owns a pool of cpu/memory/disk and a FIFO of jobs.  Jobs
//! whose requirements fit the free pool are started immediately; the rest
//! stay QUEUED until a running job releases resources.  [`Scheduler::listen`]
//! is the single blocking point of the engine: it polls the backends at a
//! fixed interval and returns whenever a job reaches a terminal state.
//!
//! Admission is first-fit in insertion order: whenever resources are
//! released, the queued jobs are rescanned from the front, so a small job
//! never starves behind a large one.

use crate::job::{Job, JobHandle, JobSpec, JobState};
use crate::sysres;
use indexmap::IndexMap;
use isoflow_core::{Clock, SystemClock};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("not a unique job name: {0}")]
    DuplicateName(String),
}

/// Optional caps on the scheduler's resource pool.  Anything left unset
/// defaults from system introspection: all cores, 90% of memory, 80% of
/// the free disk under the current directory, unlimited wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    pub cpu: Option<u32>,
    pub mem: Option<f64>,
    pub spc: Option<f64>,
    pub tim: Option<u64>,
}

impl Limits {
    isoflow_core::setters! {
        option {
            cpu: u32,
            mem: f64,
            spc: f64,
            tim: u64,
        }
    }
}

/// Runs backend jobs constrained by cpu, memory, disk space, and total
/// wall-clock time.
pub struct Scheduler<C: Clock = SystemClock> {
    tot_cpu: u32,
    tot_mem: f64,
    tot_spc: f64,
    tot_tim: Option<u64>,
    free_cpu: u32,
    free_mem: f64,
    free_spc: f64,
    /// Absolute end of the run, armed when the first job is scheduled.
    deadline: Option<Instant>,
    jobs: IndexMap<String, JobHandle>,
    /// At least one job reached a terminal state since the last `listen`
    /// return.
    dirty: bool,
    poll_interval: Duration,
    clock: C,
}

impl Scheduler<SystemClock> {
    /// Scheduler with introspected limits and the system clock.
    pub fn with_defaults(poll_interval: Duration) -> Self {
        Self::new(Limits::default(), poll_interval, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn new(limits: Limits, poll_interval: Duration, clock: C) -> Self {
        let probed = sysres::probe(".");
        let tot_cpu = limits.cpu.unwrap_or(probed.cpu);
        let tot_mem = limits.mem.unwrap_or(probed.mem_gb);
        let tot_spc = limits.spc.unwrap_or(probed.spc_gb);
        tracing::info!(
            cpu = tot_cpu,
            mem_gb = tot_mem,
            spc_gb = tot_spc,
            tim = limits.tim,
            "job scheduler started"
        );
        Self {
            tot_cpu,
            tot_mem,
            tot_spc,
            tot_tim: limits.tim,
            free_cpu: tot_cpu,
            free_mem: tot_mem,
            free_spc: tot_spc,
            deadline: None,
            jobs: IndexMap::new(),
            dirty: false,
            poll_interval,
            clock,
        }
    }

    pub fn tot_cpu(&self) -> u32 {
        self.tot_cpu
    }

    pub fn tot_mem(&self) -> f64 {
        self.tot_mem
    }

    pub fn free_cpu(&self) -> u32 {
        self.free_cpu
    }

    pub fn free_mem(&self) -> f64 {
        self.free_mem
    }

    pub fn free_spc(&self) -> f64 {
        self.free_spc
    }

    /// Schedule a job under a unique `name` to run in `wdir` (default the
    /// current directory).  The returned handle is already in some state:
    /// RUNNING if the job fit the free pool, QUEUED if it must wait, or
    /// FAILED if its requirements exceed the pool's totals outright.
    pub fn schedule_job(
        &mut self,
        name: &str,
        spec: JobSpec,
        wdir: Option<PathBuf>,
    ) -> Result<JobHandle, SchedulerError> {
        if self.jobs.contains_key(name) {
            return Err(SchedulerError::DuplicateName(name.to_string()));
        }

        // The first job scheduled starts the clock on the overall deadline.
        if self.jobs.is_empty() {
            if let Some(tim) = self.tot_tim {
                self.deadline = Some(self.clock.now() + Duration::from_secs(tim));
                tracing::info!(tim, "scheduler deadline armed");
            }
        }

        let job = Arc::new(Mutex::new(Job::new(name, spec, wdir)));
        self.jobs.insert(name.to_string(), Arc::clone(&job));

        {
            let mut j = job.lock();
            // Reject outright what can never fit, so it cannot pin the queue.
            if j.spec().cpu > self.tot_cpu
                || j.spec().mem > self.tot_mem
                || j.spec().spc > self.tot_spc
            {
                j.fail("job requirements exceed available system resources".to_string());
            } else {
                self.try_start(&mut j);
            }
            // A job that is already done must wake the next listen().
            self.dirty = self.dirty || j.state().is_terminal();
            tracing::debug!(job = name, state = %j.state(), "job scheduled");
        }

        Ok(job)
    }

    /// Block until a job becomes COMPLETED/FAILED and return true, or
    /// return false if no more jobs are QUEUED/RUNNING.
    pub fn listen(&mut self) -> bool {
        while !self.dirty && self.has_live_jobs() {
            std::thread::sleep(self.poll_interval);
            self.poll();

            if let Some(deadline) = self.deadline {
                if self.clock.now() > deadline {
                    let tim = self.tot_tim.unwrap_or(0);
                    self.stop(&format!("scheduler total run time ({tim}s) exceeded"));
                }
            }
        }

        let changed = self.dirty;
        self.dirty = false;
        tracing::debug!(changed, "job listen returned");
        changed
    }

    /// Poll all RUNNING jobs, refund the resources of those that finished,
    /// and re-scan the queue front-to-back for jobs that now fit.
    pub fn poll(&mut self) {
        let now = self.clock.now();
        let running: Vec<JobHandle> = self.live_jobs(JobState::Running);
        for job in running {
            let mut j = job.lock();
            let state = j.poll(now);
            if state != JobState::Running {
                tracing::debug!(job = %j.name(), %state, "job finished");
                self.free_cpu += j.spec().cpu;
                self.free_mem += j.spec().mem;
                self.free_spc += j.spec().spc;
                self.dirty = true;
            }
        }

        if self.dirty {
            let queued: Vec<JobHandle> = self.live_jobs(JobState::Queued);
            for job in queued {
                self.try_start(&mut job.lock());
            }
        }
    }

    /// Stop the scheduler: every owned job is stopped, queued ones without
    /// ever touching an OS resource.  The next `listen` observes the dirty
    /// flag once and then reports no remaining work.
    pub fn stop(&mut self, reason: &str) {
        tracing::info!(reason, "job scheduler stopping");
        for job in self.jobs.values() {
            let mut j = job.lock();
            let was_running = j.state() == JobState::Running;
            j.stop(reason);
            if was_running {
                self.free_cpu += j.spec().cpu;
                self.free_mem += j.spec().mem;
                self.free_spc += j.spec().spc;
            }
        }
        self.dirty = true;
    }

    /// Start a QUEUED job if its requirements are currently met.
    fn try_start(&mut self, job: &mut Job) {
        if job.spec().cpu <= self.free_cpu
            && job.spec().mem <= self.free_mem
            && job.spec().spc <= self.free_spc
        {
            job.start(self.clock.now());
            if job.state() == JobState::Running {
                self.free_cpu -= job.spec().cpu;
                self.free_mem -= job.spec().mem;
                self.free_spc -= job.spec().spc;
            } else {
                // Start failed, so a terminal state must wake listen().
                self.dirty = true;
            }
            tracing::debug!(job = %job.name(), state = %job.state(), "job start attempted");
        }
    }

    fn has_live_jobs(&self) -> bool {
        self.jobs
            .values()
            .any(|job| matches!(job.lock().state(), JobState::Queued | JobState::Running))
    }

    fn live_jobs(&self, state: JobState) -> Vec<JobHandle> {
        self.jobs
            .values()
            .filter(|job| job.lock().state() == state)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
