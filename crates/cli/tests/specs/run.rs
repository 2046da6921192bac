// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end specs for `isoflow run` with stub backends.

use assert_cmd::Command;
use serde_json::Value;

fn isoflow() -> Command {
    match Command::cargo_bin("isoflow") {
        Ok(cmd) => cmd,
        Err(err) => panic!("isoflow binary not built: {err}"),
    }
}

const STUB_SERVICES: &str = r#"
[service.ReadsMetrics]
version = "1.0"
command = "/bin/sh"
args = ["-c", "echo '{\"n_reads\": 1000}'"]

[service.SpeciesFinder]
version = "1.0"
command = "/bin/sh"
args = ["-c", "echo 'Vibrio cholerae'"]

[service.MLSTFinder]
version = "1.0"
command = "/bin/sh"
args = ["-c", "echo '{\"sequence_type\": 131}'"]

[service.ResFinder]
version = "1.0"
command = "/bin/sh"
args = ["-c", "echo reads=${inputs/reads}"]

[service.VirulenceFinder]
version = "1.0"
command = "/bin/sh"
args = ["-c", "echo ok"]
"#;

fn write_services(dir: &tempfile::TempDir, toml: &str) -> std::path::PathBuf {
    let path = dir.path().join("services.toml");
    std::fs::write(&path, toml).unwrap();
    path
}

#[test]
fn default_run_with_reads_completes() {
    let dir = tempfile::tempdir().unwrap();
    let services = write_services(&dir, STUB_SERVICES);
    let out = dir.path().join("results.json");

    let output = isoflow()
        .arg("run")
        .arg("-f")
        .arg(&services)
        .arg("--reads")
        .arg("/data/sample.fq")
        .arg("-d")
        .arg(dir.path())
        .arg("-o")
        .arg(&out)
        .args(["-p", "1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let results: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(results["inputs"]["reads"], "/data/sample.fq");
    assert_eq!(results["services"]["MLSTFinder"]["results"]["sequence_type"], 131);
    assert_eq!(results["services"]["ReadsMetrics"]["run_info"]["status"], "COMPLETED");
    assert_eq!(results["services"]["ResFinder"]["results"], "reads=/data/sample.fq");
    // the run log is part of the snapshot
    assert!(results["log"].as_array().is_some_and(|log| !log.is_empty()));
    // job outputs live under one directory per service
    assert!(dir.path().join("MLSTFinder").join("MLSTFinder.out").exists());
}

#[test]
fn required_backend_failure_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let services = write_services(
        &dir,
        r#"
        [service.SpeciesFinder]
        command = "/bin/sh"
        args = ["-c", "echo found"]

        [service.VirulenceFinder]
        command = "/bin/sh"
        args = ["-c", "exit 5"]
        "#,
    );

    let output = isoflow()
        .arg("run")
        .arg("-f")
        .arg(&services)
        .arg("--reads")
        .arg("/data/sample.fq")
        .arg("-d")
        .arg(dir.path())
        .args(["-p", "1", "virulence"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let results: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results["services"]["VirulenceFinder"]["run_info"]["status"], "FAILED");
    let errors = results["services"]["VirulenceFinder"]["errors"].as_array().unwrap();
    assert!(errors[0].as_str().unwrap().contains("check its error log"));
}

#[test]
fn undeclared_service_fails_neutrally() {
    let dir = tempfile::tempdir().unwrap();
    // no VirulenceFinder declared; SpeciesFinder succeeds
    let services = write_services(
        &dir,
        r#"
        [service.SpeciesFinder]
        command = "/bin/sh"
        args = ["-c", "echo found"]
        "#,
    );

    let output = isoflow()
        .arg("run")
        .arg("-f")
        .arg(&services)
        .arg("--reads")
        .arg("/data/sample.fq")
        .arg("-d")
        .arg(dir.path())
        .args(["-p", "1", "virulence"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let results: Value = serde_json::from_slice(&output.stdout).unwrap();
    let errors = results["services"]["VirulenceFinder"]["errors"].as_array().unwrap();
    assert!(errors[0].as_str().unwrap().contains("is not implemented"));
}

#[test]
fn invalid_target_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let services = write_services(&dir, STUB_SERVICES);
    let output = isoflow()
        .arg("run")
        .arg("-f")
        .arg(&services)
        .args(["--reads", "/data/r.fq", "bogus"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a valid target: bogus"));
}
