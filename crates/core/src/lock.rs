// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclusivity lock record
//!
//! At most one record exists per server. The record names who holds the
//! server and which run it protects; `updated_at` proves liveness.

use crate::id::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum time between two liveness refreshes
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(10);

/// Lock configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Refreshes closer together than this are skipped
    #[serde(with = "humantime_serde", default = "default_cooldown")]
    pub refresh_cooldown: Duration,
}

fn default_cooldown() -> Duration {
    DEFAULT_REFRESH_COOLDOWN
}

impl LockConfig {
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
        }
    }
}

/// The persisted lock row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub holder: String,
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn new(holder: impl Into<String>, run_id: RunId, now: DateTime<Utc>) -> Self {
        Self {
            holder: holder.into(),
            run_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a refresh at `now` is past the cooldown
    pub fn needs_refresh(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match (now - self.updated_at).to_std() {
            Ok(elapsed) => elapsed > cooldown,
            // updated_at is in the future (clock skew); nothing to prove yet
            Err(_) => false,
        }
    }

    /// How long the lock has been held
    pub fn held_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// Time since the holder last proved liveness
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.updated_at).to_std().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
