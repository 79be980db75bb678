// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-process backend: runs the dispatched-execution entry as a child

use super::{BatchDispatcher, DispatchError, DispatchRequest, JobHandle};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Dispatcher that spawns `<program> [args...] job --run-id <id>` on this host
#[derive(Clone, Debug)]
pub struct LocalProcessDispatcher {
    program: PathBuf,
    args: Vec<String>,
}

impl LocalProcessDispatcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before `job`, e.g. `--state-dir <dir>`
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn command_line(&self, handle: &JobHandle) -> Vec<String> {
        let mut line = self.args.clone();
        line.extend(["job".to_string(), "--run-id".to_string(), handle.run_id.to_string()]);
        line
    }
}

#[async_trait]
impl BatchDispatcher for LocalProcessDispatcher {
    fn backend(&self) -> &'static str {
        "local_process"
    }

    async fn create(&self, request: &DispatchRequest) -> Result<JobHandle, DispatchError> {
        // A bare name is resolved through PATH at launch
        if self.program.components().count() > 1 && !self.program.is_file() {
            return Err(DispatchError::CreateFailed(format!(
                "program not found: {}",
                self.program.display()
            )));
        }
        Ok(JobHandle {
            backend: self.backend().to_string(),
            job_id: request.job_name(),
            run_id: request.run_id.clone(),
            started: false,
        })
    }

    async fn launch(&self, handle: &JobHandle) -> Result<(), DispatchError> {
        let child = Command::new(&self.program)
            .args(self.command_line(handle))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                DispatchError::LaunchFailed(format!("{}: {}", self.program.display(), e))
            })?;
        tracing::info!(job_id = %handle.job_id, pid = ?child.id(), "local job spawned");
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
