// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end runs against a local rjd
//!
//! The workload program is swapped for `echo`/`false` so no dbt install is needed.

use crate::prelude::*;

#[test]
fn successful_run_streams_output_and_exits_zero() {
    let project = Project::with_models();
    let daemon = project.daemon("[workload]\nprogram = \"echo\"\n");

    project
        .rj()
        .server(&daemon)
        .args(["run", "--", "dbt", "build", "-s", "orders"])
        .passes()
        .stdout_has("run_started")
        .stdout_has("build --select orders")
        .stdout_has("command_completed")
        .stderr_has("finished: SUCCESS");

    project
        .rj()
        .server(&daemon)
        .args(["history"])
        .passes()
        .stdout_has("SUCCESS");
}

#[test]
fn failing_workload_exits_nonzero() {
    let project = Project::with_models();
    let daemon = project.daemon("[workload]\nprogram = \"false\"\n");

    project
        .rj()
        .server(&daemon)
        .args(["run", "--", "dbt", "run"])
        .fails()
        .stderr_has("finished: FAILED");
}

#[test]
fn detached_run_prints_id_for_later_logs() {
    let project = Project::with_models();
    let daemon = project.daemon("[workload]\nprogram = \"echo\"\n");

    let outcome = project
        .rj()
        .server(&daemon)
        .args(["run", "--detach", "--", "dbt", "seed"])
        .passes();
    let run_id = outcome.stdout.trim().to_string();
    assert!(!run_id.is_empty());

    project
        .rj()
        .server(&daemon)
        .args(["logs", &run_id])
        .passes()
        .stdout_has("command_completed");
    project
        .rj()
        .server(&daemon)
        .args(["status", &run_id])
        .passes()
        .stdout_has(&format!("Run: {}", run_id))
        .stdout_has("Project: project");
}

#[test]
fn schedule_is_stored_without_running() {
    let project = Project::with_models();
    let daemon = project.daemon("[workload]\nprogram = \"echo\"\n");

    project
        .rj()
        .server(&daemon)
        .args([
            "run",
            "--schedule",
            "@daily",
            "--schedule-name",
            "nightly",
            "--",
            "dbt",
            "build",
        ])
        .passes()
        .stdout_has("Scheduled schedule-");

    project.rj().server(&daemon).args(["history"]).passes().stdout_has("No runs");
}
