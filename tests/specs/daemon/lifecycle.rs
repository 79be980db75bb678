// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rjd startup and the read-only endpoints

use crate::prelude::*;

#[test]
fn check_reports_backend() {
    let project = Project::empty();
    let daemon = project.daemon("");

    project
        .rj()
        .server(&daemon)
        .args(["check"])
        .passes()
        .stdout_has("ok")
        .stdout_has("in_process");
}

#[test]
fn daemon_writes_pid_and_log() {
    let project = Project::empty();
    let _daemon = project.daemon("");

    let pid = std::fs::read_to_string(project.state_dir().join("rjd.pid")).unwrap();
    assert!(!pid.trim().is_empty());
    let log = std::fs::read_to_string(project.state_dir().join("rjd.log")).unwrap();
    assert!(log.contains("--- rjd: starting (pid: "));
}

#[test]
fn fresh_daemon_has_no_history_lock_or_schedules() {
    let project = Project::empty();
    let daemon = project.daemon("");

    project.rj().server(&daemon).args(["history"]).passes().stdout_has("No runs");
    project.rj().server(&daemon).args(["lock"]).passes().stdout_has("No lock held");
    project.rj().server(&daemon).args(["unlock"]).passes().stdout_has("No lock held");
    project
        .rj()
        .server(&daemon)
        .args(["schedules", "list"])
        .passes()
        .stdout_has("No schedules");
}

#[test]
fn unknown_run_is_not_found() {
    let project = Project::empty();
    let daemon = project.daemon("");

    project
        .rj()
        .server(&daemon)
        .args(["status", "01NOSUCHRUN"])
        .fails()
        .stderr_has("Run 01NOSUCHRUN not found");
}

#[test]
fn invalid_config_refuses_to_start() {
    let project = Project::empty();
    std::fs::write(
        project.state_dir().join("rjd.toml"),
        "[dispatch]\nbackend = \"serverless_job\"\n",
    )
    .unwrap();

    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin("rjd"))
        .arg("--state-dir")
        .arg(project.state_dir())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(!project.state_dir().join("rjd.pid").exists());
}
