// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Naming and addressing of schedule triggers

use rj_core::{RunConfiguration, RunId};

/// Trigger entry name for a schedule template
///
/// The schedule's own name when it has one, else its id. Characters the
/// trigger backends reject become `-`.
pub fn entry_name(config: &RunConfiguration) -> String {
    config
        .schedule_name
        .as_deref()
        .map(sanitize)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| sanitize(config.run_id.as_str()))
}

/// Endpoint a trigger calls to materialize a run from the template
pub fn trigger_url(server_url: &str, schedule_id: &RunId) -> String {
    format!(
        "{}/api/schedules/{}/trigger",
        server_url.trim_end_matches('/'),
        schedule_id
    )
}

fn sanitize(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    replaced.trim_matches('-').to_string()
}

#[cfg(test)]
#[path = "schedules_tests.rs"]
mod tests;
