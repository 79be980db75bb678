// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured run log events
//!
//! Events are stored one JSON object per line. The [`names::COMMAND_COMPLETED`]
//! event is always the last event of a run and ends every log stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known event names
pub mod names {
    pub const RUN_STARTED: &str = "run_started";
    pub const WORKLOAD_OUTPUT: &str = "workload_output";
    pub const WORKLOAD_EXITED: &str = "workload_exited";
    pub const RUN_FINALIZED: &str = "run_finalized";
    pub const ARTIFACT_PERSIST_FAILED: &str = "artifact_persist_failed";
    pub const SERVER_ERROR: &str = "server_error";
    /// Sentinel: the stream ends after this event
    pub const COMMAND_COMPLETED: &str = "command_completed";
}

/// Severity of a log event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    /// Accepts the spellings workloads commonly emit
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::Debug),
            "info" | "notice" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" | "critical" | "fatal" => Ok(Level::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// A single structured log event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub name: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        level: Level,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            name: name.into(),
            message: message.into(),
        }
    }

    /// The end-of-stream event
    pub fn sentinel(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self::new(timestamp, Level::Info, names::COMMAND_COMPLETED, message)
    }

    pub fn is_sentinel(&self) -> bool {
        self.name == names::COMMAND_COMPLETED
    }

    /// Decode one stored line
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }

    /// Encode as one line, without the trailing newline
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>5} [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.level.as_str().to_uppercase(),
            self.name,
            self.message
        )
    }
}

/// Which events a tailer wants to see
///
/// The sentinel always passes so a filtered stream still terminates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogFilter {
    pub min_level: Level,
}

impl LogFilter {
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }

    pub fn all() -> Self {
        Self::new(Level::Debug)
    }

    pub fn allows(&self, event: &LogEvent) -> bool {
        event.is_sentinel() || event.level >= self.min_level
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
