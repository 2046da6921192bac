// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::time::Instant;

fn sh(script: &str) -> JobSpec {
    JobSpec::new("/bin/sh", ["-c", script])
}

fn poll_until_terminal(job: &mut Job) -> JobState {
    for _ in 0..200 {
        let state = job.poll(Instant::now());
        if state.is_terminal() {
            return state;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("job did not reach a terminal state: {}", job.state());
}

#[test]
fn spec_serialises_with_nested_resources() {
    let spec = JobSpec::new("skesa", ["--reads", "r.fq"]).cpu(4).mem(8.0).spc(2.0).tim(600);
    assert_eq!(
        spec.as_value(),
        json!({
            "command": "skesa",
            "args": ["--reads", "r.fq"],
            "resources": {"cpu": 4, "mem": 8.0, "spc": 2.0, "tim": 600},
        })
    );
}

#[test]
fn spec_defaults() {
    let spec = JobSpec::new("ls", Vec::<String>::new());
    assert_eq!(spec.cpu, 1);
    assert_eq!(spec.tim, 0);
}

#[test]
fn successful_job_completes_with_output_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = Job::new("j1", sh("exit 0"), Some(dir.path().to_path_buf()));
    job.start(Instant::now());
    assert_eq!(job.state(), JobState::Running);

    assert_eq!(poll_until_terminal(&mut job), JobState::Completed);
    assert_eq!(job.ret_code(), Some(0));
    assert!(job.error().is_none());
    assert_eq!(std::fs::read_to_string(job.stdout_path()).unwrap(), "");
    assert_eq!(std::fs::read_to_string(job.stderr_path()).unwrap(), "");
}

#[test]
fn job_output_lands_in_named_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = Job::new("greet", sh("echo hello; echo oops >&2"), Some(dir.path().to_path_buf()));
    job.start(Instant::now());
    poll_until_terminal(&mut job);
    assert!(job.stdout_path().ends_with("greet.out"));
    assert_eq!(std::fs::read_to_string(job.stdout_path()).unwrap(), "hello\n");
    assert_eq!(std::fs::read_to_string(job.stderr_path()).unwrap(), "oops\n");
}

#[test]
fn nonzero_exit_fails_with_stderr_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = Job::new("j1", sh("exit 3"), Some(dir.path().to_path_buf()));
    job.start(Instant::now());
    assert_eq!(poll_until_terminal(&mut job), JobState::Failed);
    assert_eq!(job.ret_code(), Some(3));
    let error = job.error().unwrap();
    assert!(error.contains("check its error log"));
    assert!(error.contains("j1.err"));
}

#[test]
fn unspawnable_command_fails_on_start() {
    let dir = tempfile::tempdir().unwrap();
    let spec = JobSpec::new("/no/such/binary", Vec::<String>::new());
    let mut job = Job::new("j1", spec, Some(dir.path().to_path_buf()));
    job.start(Instant::now());
    assert_eq!(job.state(), JobState::Failed);
    assert!(job.error().is_some());
}

#[test]
fn stop_on_queued_job_records_did_not_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = Job::new("j1", sh("exit 0"), Some(dir.path().to_path_buf()));
    job.stop("out of time");
    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(job.error(), Some("job did not run: out of time"));
}

#[test]
fn stop_on_running_job_aborts_and_writes_stderr_line() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = Job::new("j1", sh("sleep 30"), Some(dir.path().to_path_buf()));
    job.start(Instant::now());
    assert_eq!(job.state(), JobState::Running);

    job.stop("operator said so");
    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(job.ret_code(), Some(-1));
    assert_eq!(job.error(), Some("job aborted: operator said so"));
    let stderr = std::fs::read_to_string(job.stderr_path()).unwrap();
    assert!(stderr.contains("Error: job aborted: operator said so"));
}

#[test]
fn stop_on_terminal_job_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = Job::new("j1", sh("exit 0"), Some(dir.path().to_path_buf()));
    job.start(Instant::now());
    poll_until_terminal(&mut job);
    job.stop("too late");
    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(job.ret_code(), Some(0));
}

#[test]
fn deadline_exceeded_stops_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = Job::new("slow", sh("sleep 30").tim(1), Some(dir.path().to_path_buf()));
    let start = Instant::now();
    job.start(start);
    assert_eq!(job.state(), JobState::Running);

    // within the allowance nothing happens
    assert_eq!(job.poll(start), JobState::Running);
    // past the allowance the job is aborted
    let state = job.poll(start + Duration::from_secs(2));
    assert_eq!(state, JobState::Failed);
    assert!(job.error().unwrap().contains("exceeded its allowed run time (1s)"));
    assert_eq!(job.ret_code(), Some(-1));
    let stderr = std::fs::read_to_string(job.stderr_path()).unwrap();
    assert!(stderr.contains("job aborted"));
}

#[test]
fn zero_tim_never_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = Job::new("j1", sh("sleep 30"), Some(dir.path().to_path_buf()));
    let start = Instant::now();
    job.start(start);
    assert_eq!(job.poll(start + Duration::from_secs(3600)), JobState::Running);
    job.stop("cleanup");
}

#[test]
fn file_path_resolves_against_wdir() {
    let dir = tempfile::tempdir().unwrap();
    let job = Job::new("j1", sh("exit 0"), Some(dir.path().to_path_buf()));
    assert_eq!(job.file_path("result.tsv"), dir.path().join("result.tsv"));
}
