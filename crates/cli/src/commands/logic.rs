// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive tester for the workflow logic.
//!
//! Runs the built-in pipeline's rule book without starting any backend:
//! you tell it which services started, completed, or failed, and it
//! recomputes the runnable set and overall status after each command.

use crate::pipeline;
use clap::Args;
use isoflow_core::{Status, Target, Workflow};
use std::io::{BufRead, Write};

#[derive(Debug, Args)]
pub struct LogicArgs {
    /// List the available params, services, and targets, then exit.
    #[arg(short, long)]
    pub list: bool,

    /// Set PARAM as provided (option may repeat, or take a comma list).
    #[arg(short, long = "param", value_name = "PARAM")]
    pub params: Vec<String>,

    /// Exclude a service or user target (option may repeat).
    #[arg(short = 'x', long = "exclude", value_name = "SVC_OR_TGT")]
    pub excludes: Vec<String>,

    /// User targets to attain.
    #[arg(value_name = "TARGET", default_values_t = vec!["DEFAULT".to_string()])]
    pub targets: Vec<String>,
}

fn names(targets: &[Target]) -> String {
    targets.iter().map(Target::name).collect::<Vec<_>>().join(", ")
}

pub fn run(args: &LogicArgs) -> anyhow::Result<i32> {
    if args.list {
        println!("Params  : {}", names(pipeline::PARAMS));
        println!("Targets : {}", names(pipeline::USER_TARGETS));
        println!("Services: {}", names(pipeline::SERVICES));
        return Ok(0);
    }

    let params = pipeline::split_names(&args.params)
        .iter()
        .map(|name| {
            pipeline::find_param(name).ok_or_else(|| anyhow::anyhow!("not a valid param: {name}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
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

    let mut workflow = Workflow::new(pipeline::rule_book()?, params, targets, excludes)?;

    match workflow.status() {
        Status::Failed => {
            println!("The workflow failed immediately; did you forget to specify params?");
            return Ok(0);
        }
        Status::Completed => {
            println!("The workflow completed immediately; did you forget to specify targets?");
            return Ok(0);
        }
        _ => {}
    }

    println!(
        "Workflow ready to rock; {} services are runnable (type 'r' to see).",
        workflow.list_runnable().len()
    );
    prompt(&workflow)?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        let Some(cmd) = tokens.next() else {
            prompt(&workflow)?;
            continue;
        };

        let service = match tokens.next() {
            Some(name) => match pipeline::find_service_prefix(name) {
                Some(service) => Some(service),
                None => {
                    println!("Not a valid service name: {name}");
                    prompt(&workflow)?;
                    continue;
                }
            },
            None => None,
        };

        let result = match cmd {
            _ if cmd.starts_with('r') => {
                println!("{}", names(workflow.list_runnable()));
                Ok(())
            }
            _ if cmd.starts_with('s') => {
                let marked = match service {
                    Some(svc) => workflow.mark_started(svc),
                    None => Ok(()),
                };
                if marked.is_ok() {
                    println!("{}", names(&workflow.list_started()));
                }
                marked
            }
            _ if cmd.starts_with('c') => {
                let marked = match service {
                    Some(svc) => workflow.mark_completed(svc),
                    None => Ok(()),
                };
                if marked.is_ok() {
                    println!("{}", names(&workflow.list_completed()));
                }
                marked
            }
            _ if cmd.starts_with('f') => {
                let marked = match service {
                    Some(svc) => workflow.mark_failed(svc),
                    None => Ok(()),
                };
                if marked.is_ok() {
                    println!("{}", names(&workflow.list_failed()));
                }
                marked
            }
            _ if cmd.starts_with('q') => break,
            _ => {
                println!(
                    "Commands (may be abbreviated): runnable, started [SVC], completed [SVC], failed [SVC], quit"
                );
                Ok(())
            }
        };
        if let Err(err) = result {
            println!("Error: {err}");
        }

        prompt(&workflow)?;
    }

    println!();
    println!("Workflow status: {}", workflow.status());
    if !workflow.list_completed().is_empty() {
        println!("- Completed : {}", names(&workflow.list_completed()));
    }
    if !workflow.list_failed().is_empty() {
        println!("- Failed    : {}", names(&workflow.list_failed()));
    }
    if !workflow.list_started().is_empty() {
        println!("- Started   : {}", names(&workflow.list_started()));
    }
    if !workflow.list_runnable().is_empty() {
        println!("- Runnable  : {}", names(workflow.list_runnable()));
    }
    Ok(0)
}

/// Print a prompt summarising the current status.
fn prompt(workflow: &Workflow) -> anyhow::Result<()> {
    print!(
        "\n[ {} | Runnable:{} Started:{} Completed:{} Failed:{} ] ? ",
        workflow.status(),
        workflow.list_runnable().len(),
        workflow.list_started().len(),
        workflow.list_completed().len(),
        workflow.list_failed().len()
    );
    std::io::stdout().flush()?;
    Ok(())
}
