// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use clap::ValueEnum;
use rj_core::{LockRecord, RunRecord};
use serde::Serialize;
use std::fmt;

use crate::client::{RunDetail, ScheduleEntry, ServerCheck};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a list of items, with `header` above text rows
pub fn print_list<T: Serialize + fmt::Display>(
    items: &[T],
    header: &str,
    empty: &str,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Text if items.is_empty() => println!("{}", empty),
        OutputFormat::Text => {
            println!("{}", header);
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(items) {
                println!("{}", json);
            }
        }
    }
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A history row
#[derive(Serialize)]
#[serde(transparent)]
pub struct RunRow(pub RunRecord);

impl RunRow {
    pub const HEADER: &'static str = "RUN ID                      STATUS        STARTED              DURATION";
}

impl fmt::Display for RunRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = &self.0;
        write!(
            f,
            "{:<27} {:<13} {:<20} {}",
            record.run_id,
            record.run_status,
            record.start_time.format(TIME_FORMAT),
            duration(record)
        )
    }
}

fn duration(record: &RunRecord) -> String {
    match record.end_time {
        Some(end) => format!("{}s", (end - record.start_time).num_seconds().max(0)),
        None => "-".to_string(),
    }
}

impl fmt::Display for RunDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = &self.record;
        writeln!(f, "Run: {}", record.run_id)?;
        writeln!(f, "  Status: {}", record.run_status)?;
        writeln!(f, "  Started: {}", record.start_time.format(TIME_FORMAT))?;
        if let Some(end) = record.end_time {
            writeln!(f, "  Ended: {} ({})", end.format(TIME_FORMAT), duration(record))?;
        }
        if let Some(config) = &self.configuration {
            writeln!(f, "  Project: {}", config.project)?;
            writeln!(f, "  Requester: {}", config.requester)?;
            writeln!(f, "  Backend: {}", config.cloud_provider)?;
            write!(f, "  Command: {}", config.invocation)?;
        }
        Ok(())
    }
}

/// A schedule row
#[derive(Serialize)]
#[serde(transparent)]
pub struct ScheduleRow(pub ScheduleEntry);

impl ScheduleRow {
    pub const HEADER: &'static str = "NAME                     CRON              DESCRIPTION";
}

impl fmt::Display for ScheduleRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry = &self.0;
        write!(
            f,
            "{:<24} {:<17} {}",
            entry.name,
            entry.cron_expression,
            entry.description.as_deref().unwrap_or("-")
        )
    }
}

/// The current lock holder
#[derive(Serialize)]
#[serde(transparent)]
pub struct LockView(pub LockRecord);

impl fmt::Display for LockView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lock = &self.0;
        writeln!(f, "Lock held by {}", lock.holder)?;
        writeln!(f, "  Run: {}", lock.run_id)?;
        writeln!(f, "  Since: {}", lock.created_at.format(TIME_FORMAT))?;
        write!(f, "  Last refresh: {}", lock.updated_at.format(TIME_FORMAT))
    }
}

/// Server health with the URL it was reached at
#[derive(Serialize)]
pub struct ServerStatus {
    pub server_url: String,
    #[serde(flatten)]
    pub check: ServerCheck,
}

impl ServerStatus {
    pub fn new(server_url: &str, check: ServerCheck) -> Self {
        Self {
            server_url: server_url.to_string(),
            check,
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rjd at {}: {} (backend {}, up {}s)",
            self.server_url, self.check.status, self.check.backend, self.check.uptime_secs
        )
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
