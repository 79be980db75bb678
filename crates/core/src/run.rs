// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run configuration, run records, and the run-status state machine

use crate::cron::RUN_NOW;
use crate::id::RunId;
use crate::invocation::WorkloadInvocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Lifecycle status of a run
///
/// `Initializing → Running → {Success, Failed, ServerError}`. A run may skip
/// `Running` when it fails before the workload starts, but never moves back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Initializing,
    Running,
    Success,
    Failed,
    ServerError,
}

/// Rejected status transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid run status transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: RunStatus,
    pub to: RunStatus,
}

impl RunStatus {
    pub const ALL: [RunStatus; 5] = [
        RunStatus::Initializing,
        RunStatus::Running,
        RunStatus::Success,
        RunStatus::Failed,
        RunStatus::ServerError,
    ];

    fn rank(self) -> u8 {
        match self {
            RunStatus::Initializing => 0,
            RunStatus::Running => 1,
            RunStatus::Success | RunStatus::Failed | RunStatus::ServerError => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    pub fn can_transition_to(self, next: RunStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Pure transition function
    pub fn transition(self, next: RunStatus) -> Result<RunStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// Statuses from which `next` may be entered
    pub fn predecessors(next: RunStatus) -> Vec<RunStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Initializing => "INITIALIZING",
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
            RunStatus::ServerError => "SERVER_ERROR",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown run status: {}", s))
    }
}

/// One execution's status record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub run_status: RunStatus,
}

/// Run-time options sent by the client alongside the invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub project: String,
    #[serde(default)]
    pub server_url: String,
    #[serde(default = "default_cloud_provider")]
    pub cloud_provider: String,
    #[serde(default)]
    pub provider_config: BTreeMap<String, String>,
    pub requester: String,
    /// Cron expression, or `@now` for an immediate run
    #[serde(default = "default_cron_schedule")]
    pub cron_schedule: String,
    #[serde(default)]
    pub schedule_name: Option<String>,
    #[serde(default)]
    pub schedule_description: Option<String>,
    /// Hex SHA-256 of the uploaded artifact archive
    #[serde(default)]
    pub artifact_digest: Option<String>,
}

fn default_cloud_provider() -> String {
    "local".to_string()
}

fn default_cron_schedule() -> String {
    RUN_NOW.to_string()
}

impl RunOptions {
    pub fn new(project: impl Into<String>, requester: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            server_url: String::new(),
            cloud_provider: default_cloud_provider(),
            provider_config: BTreeMap::new(),
            requester: requester.into(),
            cron_schedule: default_cron_schedule(),
            schedule_name: None,
            schedule_description: None,
            artifact_digest: None,
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.cron_schedule.trim() == RUN_NOW
    }

    /// Build the persisted configuration for the given id
    pub fn into_configuration(
        self,
        run_id: RunId,
        invocation: WorkloadInvocation,
        created_at: DateTime<Utc>,
    ) -> RunConfiguration {
        let immediate = self.is_immediate();
        RunConfiguration {
            run_id,
            project: self.project,
            server_url: self.server_url,
            cloud_provider: self.cloud_provider,
            provider_config: self.provider_config,
            requester: self.requester,
            invocation,
            cron_schedule: (!immediate).then_some(self.cron_schedule),
            schedule_name: if immediate { None } else { self.schedule_name },
            schedule_description: if immediate {
                None
            } else {
                self.schedule_description
            },
            created_at,
        }
    }
}

/// Everything needed to (re)execute a run
///
/// When `cron_schedule` is set the record is a recurring template whose id
/// carries the schedule prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub run_id: RunId,
    pub project: String,
    pub server_url: String,
    pub cloud_provider: String,
    #[serde(default)]
    pub provider_config: BTreeMap<String, String>,
    pub requester: String,
    pub invocation: WorkloadInvocation,
    #[serde(default)]
    pub cron_schedule: Option<String>,
    #[serde(default)]
    pub schedule_name: Option<String>,
    #[serde(default)]
    pub schedule_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RunConfiguration {
    pub fn is_schedule(&self) -> bool {
        self.cron_schedule.is_some()
    }

    /// Clone this template into a fresh single-execution configuration
    pub fn materialize(&self, run_id: RunId, created_at: DateTime<Utc>) -> RunConfiguration {
        RunConfiguration {
            run_id,
            cron_schedule: None,
            schedule_name: None,
            schedule_description: None,
            created_at,
            ..self.clone()
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
