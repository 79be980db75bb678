// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rj artifacts` works offline and honours ignore rules

use crate::prelude::*;

#[test]
fn lists_project_files_without_build_output() {
    Project::with_models()
        .rj()
        .args(["artifacts"])
        .passes()
        .stdout_has("dbt_project.yml")
        .stdout_has("models/orders.sql")
        .stdout_lacks("target/manifest.json");
}

#[test]
fn rjignore_and_flags_add_patterns() {
    let project = Project::with_models();
    project.file(".rjignore", "# scratch files\n*.tmp\n");
    project.file("notes.tmp", "x");
    project.file("seeds/big.csv", "a,b\n");

    project
        .rj()
        .args(["artifacts", "--ignore", "seeds/**"])
        .passes()
        .stdout_has("models/orders.sql")
        .stdout_lacks("notes.tmp")
        .stdout_lacks("seeds/big.csv");
}

#[test]
fn json_format_prints_an_array() {
    Project::with_models()
        .rj()
        .args(["--format", "json", "artifacts"])
        .passes()
        .stdout_has("[")
        .stdout_has("\"models/orders.sql\"");
}
