// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors reported before or without a server

use crate::prelude::*;

#[test]
fn unreachable_server_suggests_fixes() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    Project::empty()
        .rj()
        .args(["--server-url", &format!("http://127.0.0.1:{}", port), "history"])
        .fails()
        .stderr_has("Cannot reach rjd")
        .stderr_has("RJ_SERVER_URL");
}

#[test]
fn run_requires_a_command() {
    Project::empty().rj().args(["run"]).fails();
}

#[test]
fn unknown_workload_command_fails_before_upload() {
    Project::with_models()
        .rj()
        .args(["run", "--", "dbt", "frobnicate"])
        .fails()
        .stderr_has("unknown command: frobnicate");
}

#[test]
fn invalid_cron_fails_before_upload() {
    Project::with_models()
        .rj()
        .args(["run", "--schedule", "61 * * * *", "--", "dbt", "build"])
        .fails()
        .stderr_has("minute");
}
