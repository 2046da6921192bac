// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run the pipeline end to end against real backends.
//!
//! Services are declared in a TOML file (see [`crate::shims`]); which of
//! them actually run is decided by the rule book, the provided inputs,
//! and the requested targets.  The final blackboard, including the run
//! log, is written as JSON to stdout or to `--out`.

use crate::pipeline;
use crate::shims::{CommandShim, ServiceFile, UnimplementedShim};
use clap::Args;
use isoflow_core::{Blackboard, Status, SystemClock, Target, Workflow};
use isoflow_engine::{Executor, Limits, Scheduler, Shim};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// TOML file declaring the backend services.
    #[arg(short = 'f', long, value_name = "FILE")]
    pub services: PathBuf,

    /// Path to the sequencing reads.
    #[arg(long, value_name = "FILE")]
    pub reads: Option<PathBuf>,

    /// Path to pre-assembled contigs.
    #[arg(long, value_name = "FILE")]
    pub contigs: Option<PathBuf>,

    /// Species name, when already known.
    #[arg(long, value_name = "NAME")]
    pub species: Option<String>,

    /// Exclude a service or user target (option may repeat).
    #[arg(short = 'x', long = "exclude", value_name = "SVC_OR_TGT")]
    pub excludes: Vec<String>,

    /// Directory the services run under (one subdirectory per job).
    #[arg(short = 'd', long, value_name = "DIR", default_value = ".")]
    pub wdir: PathBuf,

    /// Write the JSON results here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,

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
    #[arg(short, long, value_name = "SECS", default_value_t = 2)]
    pub poll: u64,

    /// User targets to attain.
    #[arg(value_name = "TARGET", default_values_t = vec!["DEFAULT".to_string()])]
    pub targets: Vec<String>,
}

pub fn run(args: &RunArgs, verbose: bool) -> anyhow::Result<i32> {
    let defs: ServiceFile = toml::from_str(&std::fs::read_to_string(&args.services)?)?;

    let board = Arc::new(Mutex::new(Blackboard::new(verbose)));
    let mut params: Vec<Target> = Vec::new();
    {
        let mut b = board.lock();
        if let Some(reads) = &args.reads {
            b.put("inputs/reads", reads.display().to_string());
            params.push(pipeline::params::READS);
        }
        if let Some(contigs) = &args.contigs {
            b.put("inputs/contigs", contigs.display().to_string());
            params.push(pipeline::params::CONTIGS);
        }
        if let Some(species) = &args.species {
            b.put("inputs/species", species.clone());
            params.push(pipeline::params::SPECIES);
        }
    }

    let targets = pipeline::split_names(&args.targets)
        .iter()
        .map(|name| {
            pipeline::find_user_target(name)
                .ok_or_else(|| anyhow::anyhow!("not a valid target: {name}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let excludes = pipeline::split_names(&args.excludes)
        .iter()
        .map(|name| {
            pipeline::find_excludable(name)
                .ok_or_else(|| anyhow::anyhow!("not a valid service or target: {name}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let workflow = Workflow::new(pipeline::rule_book()?, params, targets, excludes)?;

    let limits = Limits {
        cpu: args.tot_cpu,
        mem: args.tot_mem,
        spc: args.tot_spc,
        tim: args.tot_tim,
    };
    let scheduler = Arc::new(Mutex::new(Scheduler::new(
        limits,
        Duration::from_secs(args.poll),
        SystemClock,
    )));

    let mut services: HashMap<Target, Box<dyn Shim<SystemClock>>> = HashMap::new();
    for service in pipeline::SERVICES {
        let shim: Box<dyn Shim<SystemClock>> = match defs.service.get(service.name()) {
            Some(def) => Box::new(CommandShim::new(def.clone(), &args.wdir)),
            None => Box::new(UnimplementedShim),
        };
        services.insert(*service, shim);
    }

    let mut executor = Executor::new(workflow, services, scheduler);
    let status = executor.execute(&board)?;

    let snapshot = board.lock().as_value(true);
    let json = serde_json::to_string_pretty(&snapshot)?;
    match &args.out {
        Some(path) => std::fs::write(path, json)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    tracing::info!(%status, "pipeline run finished");
    Ok(match status {
        Status::Completed => 0,
        _ => executor.workflow().list_failed().len().max(1) as i32,
    })
}
