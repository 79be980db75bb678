// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-wide exclusivity lock
//!
//! One run at a time may hold the server. The check-and-insert happens in a
//! single registry statement, so concurrent acquires resolve to one winner.

use chrono::{DateTime, Utc};
use rj_core::{Clock, LockConfig, LockRecord, RunId};
use rj_storage::{LockInsert, Registry, RegistryError};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from lock operations
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds the lock; carries the holder's record unchanged
    #[error("server is locked by {} running {} since {}", .0.holder, .0.run_id, .0.created_at)]
    Conflict(LockRecord),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Acquire, refresh and release the lock row
#[derive(Clone)]
pub struct LockService<C: Clock> {
    registry: Registry,
    clock: C,
    config: LockConfig,
    /// Last `updated_at` this process wrote or observed for a run
    last_refresh: Arc<Mutex<Option<(RunId, DateTime<Utc>)>>>,
}

impl<C: Clock> LockService<C> {
    pub fn new(registry: Registry, clock: C, config: LockConfig) -> Self {
        Self {
            registry,
            clock,
            config,
            last_refresh: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Take the lock for `run_id`, or report who holds it
    pub async fn acquire(
        &self,
        holder: &str,
        run_id: &RunId,
    ) -> Result<LockRecord, LockError> {
        let record = LockRecord::new(holder, run_id.clone(), self.clock.now());
        match self.registry.insert_lock(&record).await? {
            LockInsert::Inserted => {
                tracing::info!(holder, run_id = %run_id, "lock acquired");
                self.remember(run_id, record.updated_at);
                Ok(record)
            }
            LockInsert::Held(existing) => {
                tracing::info!(
                    holder,
                    run_id = %run_id,
                    held_by = %existing.holder,
                    held_for = %existing.run_id,
                    "lock conflict"
                );
                Err(LockError::Conflict(existing))
            }
        }
    }

    /// Administrative release of whatever lock exists
    ///
    /// Returns whether a lock was held. Releasing an unlocked server is a no-op.
    pub async fn release(&self) -> Result<bool, LockError> {
        let released = self.registry.delete_lock().await?;
        self.forget();
        if released {
            tracing::warn!("lock released administratively");
        }
        Ok(released)
    }

    /// Release the lock only if it still protects `run_id`
    pub async fn release_run(&self, run_id: &RunId) -> Result<bool, LockError> {
        let released = self.registry.delete_lock_for(run_id).await?;
        self.forget();
        if released {
            tracing::info!(run_id = %run_id, "lock released");
        }
        Ok(released)
    }

    /// Prove liveness for `run_id`
    ///
    /// Writes `updated_at` only when the cooldown has passed since the last
    /// update and the lock still protects this run. Returns whether a write
    /// happened.
    pub async fn refresh(&self, run_id: &RunId) -> Result<bool, LockError> {
        let now = self.clock.now();
        if self.recently_refreshed(run_id, now) {
            return Ok(false);
        }

        let Some(current) = self.registry.load_lock().await? else {
            return Ok(false);
        };
        if &current.run_id != run_id {
            return Ok(false);
        }
        if !current.needs_refresh(now, self.config.refresh_cooldown) {
            self.remember(run_id, current.updated_at);
            return Ok(false);
        }

        let touched = self.registry.touch_lock(run_id, now).await?;
        if touched {
            tracing::debug!(run_id = %run_id, "lock refreshed");
            self.remember(run_id, now);
        }
        Ok(touched)
    }

    pub async fn load(&self) -> Result<Option<LockRecord>, LockError> {
        Ok(self.registry.load_lock().await?)
    }

    fn recently_refreshed(&self, run_id: &RunId, now: DateTime<Utc>) -> bool {
        let last = self.last_refresh.lock().unwrap_or_else(|e| e.into_inner());
        match last.as_ref() {
            Some((id, at)) if id == run_id => match (now - *at).to_std() {
                Ok(elapsed) => elapsed <= self.config.refresh_cooldown,
                Err(_) => true,
            },
            _ => false,
        }
    }

    fn remember(&self, run_id: &RunId, at: DateTime<Utc>) {
        *self.last_refresh.lock().unwrap_or_else(|e| e.into_inner()) = Some((run_id.clone(), at));
    }

    fn forget(&self) {
        *self.last_refresh.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
