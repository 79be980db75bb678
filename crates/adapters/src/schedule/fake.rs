// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake scheduler for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{CronScheduler, ScheduleEntry, ScheduleError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Recorded scheduler call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleCall {
    CreateOrUpdate { entry: ScheduleEntry },
    Delete { name: String },
    List,
}

#[derive(Debug, Default)]
struct FakeState {
    entries: BTreeMap<String, ScheduleEntry>,
    calls: Vec<ScheduleCall>,
    fail: Option<String>,
}

/// In-memory scheduler that records calls
#[derive(Clone, Default)]
pub struct FakeScheduler {
    state: Arc<Mutex<FakeState>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a request error
    pub fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).fail = Some(message.into());
    }

    pub fn entry(&self, name: &str) -> Option<ScheduleEntry> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .get(name)
            .cloned()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ScheduleCall> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).calls.clone()
    }
}

#[async_trait]
impl CronScheduler for FakeScheduler {
    async fn create_or_update(
        &self,
        name: &str,
        cron_expression: &str,
        trigger_url: &str,
        description: Option<&str>,
    ) -> Result<(), ScheduleError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let entry = ScheduleEntry {
            name: name.to_string(),
            cron_expression: cron_expression.to_string(),
            trigger_url: trigger_url.to_string(),
            description: description.map(str::to_string),
        };
        state.calls.push(ScheduleCall::CreateOrUpdate {
            entry: entry.clone(),
        });
        if let Some(message) = &state.fail {
            return Err(ScheduleError::Request(message.clone()));
        }
        state.entries.insert(name.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, ScheduleError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(ScheduleCall::Delete {
            name: name.to_string(),
        });
        if let Some(message) = &state.fail {
            return Err(ScheduleError::Request(message.clone()));
        }
        Ok(state.entries.remove(name).is_some())
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(ScheduleCall::List);
        if let Some(message) = &state.fail {
            return Err(ScheduleError::Request(message.clone()));
        }
        Ok(state.entries.values().cloned().collect())
    }
}
