// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Help, version and completion specs

use crate::prelude::*;
use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_commands() {
    Project::empty()
        .rj()
        .args(["--help"])
        .passes()
        .stdout_has("run")
        .stdout_has("logs")
        .stdout_has("history")
        .stdout_has("unlock")
        .stdout_has("schedules");
}

#[test]
fn version_is_printed() {
    Command::cargo_bin("rj")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("rj "));
}

#[test]
fn completions_are_generated_for_bash() {
    Command::cargo_bin("rj")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_rj"));
}

#[test]
fn daemon_help_lists_job_entry() {
    Command::cargo_bin("rjd")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve").and(predicate::str::contains("job")));
}
