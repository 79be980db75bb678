// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload adapters
//!
//! A workload is the opaque transformation command a run executes. It
//! reports progress as [`WorkloadEvent`]s pushed into a channel the caller
//! owns, and finishes with its own success flag.

mod process;

pub use process::{parse_line, ProcessWorkload, Stream};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeWorkload, WorkloadCall};

use async_trait::async_trait;
use rj_core::{Level, RunId, WorkloadInvocation};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from workload invocation
///
/// These are failures to run the workload at all. A workload that runs and
/// reports failure returns an outcome with `success == false`.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("failed to start workload: {0}")]
    SpawnFailed(String),
    #[error("working directory does not exist: {0}")]
    MissingWorkingDir(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the workload needs to run once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadContext {
    pub run_id: RunId,
    pub program: String,
    pub invocation: WorkloadInvocation,
    /// Unpacked project files; the process working directory
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl WorkloadContext {
    /// Full argument vector, program first
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.program.clone()];
        argv.extend(self.invocation.to_args());
        argv
    }

    /// Environment passed to the process
    pub fn process_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("RJ_RUN_ID".to_string(), self.run_id.to_string()),
            (
                "RJ_INPUT_DIR".to_string(),
                self.input_dir.display().to_string(),
            ),
            (
                "RJ_OUTPUT_DIR".to_string(),
                self.output_dir.display().to_string(),
            ),
        ];
        env.extend(self.env.iter().cloned());
        env
    }
}

/// One progress event, before it is timestamped into the run log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadEvent {
    pub level: Level,
    pub name: String,
    pub message: String,
}

impl WorkloadEvent {
    pub fn new(level: Level, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            name: name.into(),
            message: message.into(),
        }
    }
}

/// How the workload itself finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
}

impl WorkloadOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
        }
    }

    pub fn failed(exit_code: Option<i32>) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Adapter that runs a workload
#[async_trait]
pub trait Workload: Clone + Send + Sync + 'static {
    /// Run to completion, pushing every progress event into `events`
    ///
    /// A closed receiver does not stop the workload.
    async fn invoke(
        &self,
        ctx: &WorkloadContext,
        events: mpsc::Sender<WorkloadEvent>,
    ) -> Result<WorkloadOutcome, WorkloadError>;
}
