// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end specs for the interactive `isoflow logic` tester.

use assert_cmd::Command;

fn isoflow() -> Command {
    match Command::cargo_bin("isoflow") {
        Ok(cmd) => cmd,
        Err(err) => panic!("isoflow binary not built: {err}"),
    }
}

#[test]
fn list_prints_the_vocabulary() {
    let output = isoflow().args(["logic", "--list"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Params  : reads, contigs, species"));
    assert!(stdout.contains("MLSTFinder"));
    assert!(stdout.contains("DEFAULT"));
}

#[test]
fn no_params_fails_immediately() {
    let output = isoflow().args(["logic", "mlst"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("failed immediately"), "{stdout}");
}

#[test]
fn interactive_session_drives_mlst_to_completion() {
    let output = isoflow()
        .args(["logic", "-p", "reads", "mlst"])
        .write_stdin("r\ns Sp\nc Sp\ns ML\nc ML\nq\n")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    // initial runnable is the species finder, then MLST unlocks
    assert!(stdout.contains("SpeciesFinder"), "{stdout}");
    assert!(stdout.contains("Workflow status: COMPLETED"), "{stdout}");
    assert!(stdout.contains("- Completed : SpeciesFinder, MLSTFinder"), "{stdout}");
}

#[test]
fn failing_both_mlst_paths_fails_the_workflow() {
    let output = isoflow()
        .args(["logic", "-p", "reads", "mlst"])
        .write_stdin("f Sp\nq\n")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Workflow status: FAILED"), "{stdout}");
}

#[test]
fn excluded_service_counts_as_failed() {
    let output = isoflow()
        .args(["logic", "-p", "reads", "-x", "VirulenceFinder", "virulence"])
        .write_stdin("q\n")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("failed immediately"), "{stdout}");
}

#[test]
fn unknown_service_name_is_reported() {
    let output = isoflow()
        .args(["logic", "-p", "reads", "mlst"])
        .write_stdin("c Bogus\nq\n")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Not a valid service name: Bogus"), "{stdout}");
}

#[test]
fn invalid_target_is_an_error() {
    let output = isoflow().args(["logic", "-p", "reads", "bogus"]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a valid target: bogus"), "{stderr}");
}
