// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! isoflow — dependency-driven analysis pipeline runner.
//!
//! Results and reports go to stdout; tracing logs go to stderr.

mod commands;
mod pipeline;
mod shims;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "isoflow")]
#[command(about = "Dependency-driven analysis pipeline runner", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv); logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run replicates of a command through the job scheduler.
    Sched(commands::sched::SchedArgs),
    /// Exercise the workflow logic interactively, without backends.
    Logic(commands::logic::LogicArgs),
    /// Run the pipeline end to end against declared backend services.
    Run(commands::run::RunArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let result = match &cli.command {
        Command::Sched(args) => commands::sched::run(args),
        Command::Logic(args) => commands::logic::run(args),
        Command::Run(args) => commands::run::run(args, cli.verbose > 0),
    };

    match result {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
