// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end specs for `isoflow sched`.

use assert_cmd::Command;
use std::time::Instant;

fn isoflow() -> Command {
    match Command::cargo_bin("isoflow") {
        Ok(cmd) => cmd,
        Err(err) => panic!("isoflow binary not built: {err}"),
    }
}

fn run_sched(dir: &tempfile::TempDir, args: &[&str], command: &[&str]) -> (i32, String) {
    let output = isoflow()
        .arg("sched")
        .args(args)
        .arg("-w")
        .arg(dir.path())
        .arg("--")
        .args(command)
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    (output.status.code().unwrap_or(-1), stdout)
}

#[test]
fn trivial_shell_job_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout) = run_sched(&dir, &[], &["/bin/sh", "-c", "exit 0"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("- job: COMPLETED"), "{stdout}");
    assert!(dir.path().join("job.out").exists());
    assert!(dir.path().join("job.err").exists());
}

#[test]
fn exit_code_counts_failed_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout) = run_sched(&dir, &["-r", "2"], &["/bin/sh", "-c", "exit 1"]);
    assert_eq!(code, 2);
    assert!(stdout.contains("- job-1: FAILED"), "{stdout}");
    assert!(stdout.contains("- job-2: FAILED"), "{stdout}");
}

#[test]
fn cpu_limit_forces_sequential_replicates() {
    let dir = tempfile::tempdir().unwrap();
    let started = Instant::now();
    let (code, _) = run_sched(&dir, &["--tot-cpu", "1", "-p", "1", "-r", "3"], &["/bin/sleep", "1"]);
    assert_eq!(code, 0);
    // three 1s jobs on one cpu cannot overlap
    assert!(started.elapsed().as_secs_f64() >= 3.0);
    for r in 1..=3 {
        assert!(dir.path().join(format!("job-{r}")).join(format!("job-{r}.out")).exists());
    }
}

#[test]
fn per_job_time_limit_aborts_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout) = run_sched(&dir, &["-p", "1", "-t", "2"], &["/bin/sleep", "30"]);
    assert_eq!(code, 1);
    assert!(stdout.contains("exceeded its allowed run time (2s)"), "{stdout}");
    let stderr_file = std::fs::read_to_string(dir.path().join("job.err")).unwrap();
    assert!(stderr_file.contains("Error: job aborted"));
}

#[test]
fn scheduler_deadline_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let started = Instant::now();
    let (code, stdout) = run_sched(&dir, &["--tot-tim", "2", "-p", "1"], &["/bin/sleep", "30"]);
    assert_eq!(code, 1);
    assert!(stdout.contains("scheduler total run time (2s) exceeded"), "{stdout}");
    assert!(started.elapsed().as_secs() < 15);
}

#[test]
fn over_resourced_job_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout) = run_sched(&dir, &["--tot-mem", "1", "-m", "10"], &["/bin/ls"]);
    assert_eq!(code, 1);
    assert!(stdout.contains("exceed available system resources"), "{stdout}");
}
