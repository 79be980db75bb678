// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron-trigger adapters
//!
//! A trigger calls an HTTP endpoint on a cron schedule. Entries are keyed by
//! name: creating an existing name replaces it.

mod cloud;
mod noop;

pub use cloud::CloudScheduler;
pub use noop::NoOpScheduler;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeScheduler, ScheduleCall};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from scheduler operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("scheduler request failed: {0}")]
    Request(String),
    #[error("scheduler rejected {name}: {reason}")]
    Rejected { name: String, reason: String },
    #[error("unexpected scheduler response: {0}")]
    Decode(String),
}

/// One registered trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub name: String,
    pub cron_expression: String,
    pub trigger_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Adapter for a cron trigger service
#[async_trait]
pub trait CronScheduler: Clone + Send + Sync + 'static {
    /// Create the trigger, or replace the one with the same name
    async fn create_or_update(
        &self,
        name: &str,
        cron_expression: &str,
        trigger_url: &str,
        description: Option<&str>,
    ) -> Result<(), ScheduleError>;

    /// Remove a trigger. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, ScheduleError>;

    async fn list(&self) -> Result<Vec<ScheduleEntry>, ScheduleError>;
}

/// Backend chosen at startup from configuration
#[derive(Clone, Debug)]
pub enum Scheduler {
    Cloud(CloudScheduler),
    NoOp(NoOpScheduler),
}

#[async_trait]
impl CronScheduler for Scheduler {
    async fn create_or_update(
        &self,
        name: &str,
        cron_expression: &str,
        trigger_url: &str,
        description: Option<&str>,
    ) -> Result<(), ScheduleError> {
        match self {
            Scheduler::Cloud(s) => {
                s.create_or_update(name, cron_expression, trigger_url, description)
                    .await
            }
            Scheduler::NoOp(s) => {
                s.create_or_update(name, cron_expression, trigger_url, description)
                    .await
            }
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, ScheduleError> {
        match self {
            Scheduler::Cloud(s) => s.delete(name).await,
            Scheduler::NoOp(s) => s.delete(name).await,
        }
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        match self {
            Scheduler::Cloud(s) => s.list().await,
            Scheduler::NoOp(s) => s.list().await,
        }
    }
}
