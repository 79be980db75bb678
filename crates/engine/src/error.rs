// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use crate::{ExecuteError, LockError};
use rj_adapters::{DispatchError, ScheduleError};
use rj_core::{CronError, RunId};
use rj_storage::{ArtifactError, LogError, RegistryError};
use thiserror::Error;

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("scheduler error: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("invalid schedule: {0}")]
    Cron(#[from] CronError),
    #[error("execute error: {0}")]
    Execute(#[from] ExecuteError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("run not found: {0}")]
    RunNotFound(RunId),
}
