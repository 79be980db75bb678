// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler for environments without a managed trigger service
//!
//! Entries are kept in memory and logged, but nothing ever fires them.

use super::{CronScheduler, ScheduleEntry, ScheduleError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct NoOpScheduler {
    entries: Arc<Mutex<BTreeMap<String, ScheduleEntry>>>,
}

impl NoOpScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CronScheduler for NoOpScheduler {
    async fn create_or_update(
        &self,
        name: &str,
        cron_expression: &str,
        trigger_url: &str,
        description: Option<&str>,
    ) -> Result<(), ScheduleError> {
        tracing::warn!(
            name,
            cron_expression,
            trigger_url,
            "no scheduler backend configured; trigger recorded but will not fire"
        );
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).insert(
            name.to_string(),
            ScheduleEntry {
                name: name.to_string(),
                cron_expression: cron_expression.to_string(),
                trigger_url: trigger_url.to_string(),
                description: description.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, ScheduleError> {
        let existed = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some();
        tracing::info!(name, existed, "schedule deleted");
        Ok(existed)
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "noop_tests.rs"]
mod tests;
