// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler test harness: run replicates of a command under resource
//! constraints.
//!
//! Runs COUNT replicates of CMD with ARGS against the scheduler's
//! cpu/memory/disk/time pool.  A single replicate runs in WDIR; multiple
//! replicates run in `WDIR/NAME-{1..COUNT}`.  Each job leaves `NAME.out`
//! and `NAME.err` in its work directory.  The exit code is the number of
//! FAILED jobs.

use clap::Args;
use isoflow_core::SystemClock;
use isoflow_engine::{JobHandle, JobSpec, JobState, Limits, Scheduler};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct SchedArgs {
    /// Base name of the job to run.
    #[arg(short, long, value_name = "NAME", default_value = "job")]
    pub name: String,

    /// Number of replicates to start.
    #[arg(short, long, value_name = "COUNT", default_value_t = 1)]
    pub replicates: u32,

    /// Work dir base name to run the job in.
    #[arg(short, long, value_name = "WDIR", default_value = ".")]
    pub wdir: PathBuf,

    /// CPUs required by each job.
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    pub cpu: u32,

    /// GB memory required by each job.
    #[arg(short, long, value_name = "GB", default_value_t = 1.0)]
    pub mem: f64,

    /// GB disk space required by each job.
    #[arg(short, long, value_name = "GB", default_value_t = 1.0)]
    pub spc: f64,

    /// Maximum job runtime in seconds (0 = unlimited).
    #[arg(short, long, value_name = "SECS", default_value_t = 600)]
    pub tim: u64,

    /// Number of CPUs to allocate (default: all).
    #[arg(long, value_name = "N")]
    pub tot_cpu: Option<u32>,

    /// GB of memory to allocate (default: 90% of physical).
    #[arg(long, value_name = "GB")]
    pub tot_mem: Option<f64>,

    /// GB of disk space to allocate (default: 80% of free).
    #[arg(long, value_name = "GB")]
    pub tot_spc: Option<f64>,

    /// Maximum total wall clock run time in seconds.
    #[arg(long, value_name = "SECS")]
    pub tot_tim: Option<u64>,

    /// Seconds between backend polls.
    #[arg(short, long, value_name = "SECS", default_value_t = 1)]
    pub poll: u64,

    /// Command to run (must be absolute or on the path), and its arguments.
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

pub fn run(args: &SchedArgs) -> anyhow::Result<i32> {
    let limits = Limits {
        cpu: args.tot_cpu,
        mem: args.tot_mem,
        spc: args.tot_spc,
        tim: args.tot_tim,
    };
    let mut scheduler = Scheduler::new(limits, Duration::from_secs(args.poll), SystemClock);

    let (command, cmd_args) = args
        .command
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("no command given"))?;
    let spec = JobSpec::new(command, cmd_args.iter().cloned())
        .cpu(args.cpu)
        .mem(args.mem)
        .spc(args.spc)
        .tim(args.tim);

    let mut jobs: Vec<JobHandle> = Vec::new();
    if args.replicates <= 1 {
        jobs.push(scheduler.schedule_job(&args.name, spec, Some(args.wdir.clone()))?);
    } else {
        for r in 1..=args.replicates {
            let name = format!("{}-{r}", args.name);
            let wdir = args.wdir.join(&name);
            jobs.push(scheduler.schedule_job(&name, spec.clone(), Some(wdir))?);
        }
    }

    while scheduler.listen() {}

    for job in &jobs {
        let j = job.lock();
        match j.error() {
            Some(error) => println!("- {}: {}: {error}", j.name(), j.state()),
            None => println!("- {}: {}", j.name(), j.state()),
        }
    }

    let failed = jobs.iter().filter(|job| job.lock().state() == JobState::Failed).count();
    Ok(failed as i32)
}
