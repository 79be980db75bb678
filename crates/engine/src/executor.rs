// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job executor
//!
//! Drives one run from INITIALIZING to a terminal status. Whatever happens,
//! the run's log ends with the sentinel event and the run's lock is released.

use crate::lock::LockService;
use chrono::{DateTime, Utc};
use crate::log_channel::{LogChannel, LogWriter};
use rj_adapters::{Workload, WorkloadContext, WorkloadError, WorkloadEvent};
use rj_core::log::names;
use rj_core::{Clock, Level, LogEvent, RunId, RunStatus, WorkloadInvocation};
use rj_storage::{copy_dir, ArtifactError, ArtifactStore, LogError, Registry, RegistryError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Buffered workload events before the workload is slowed down
const EVENT_BUFFER: usize = 256;

/// Errors that escape a run and finalize it as SERVER_ERROR
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("log error: {0}")]
    Log(#[from] LogError),
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("workload error: {0}")]
    Workload(#[from] WorkloadError),
    #[error("artifact input not found: {0}")]
    MissingInput(PathBuf),
}

/// How the workload is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Program the invocation's command is passed to
    pub program: String,
    /// Directory under the input dir holding generated outputs
    pub output_subdir: PathBuf,
    /// Extra environment for the workload
    pub env: Vec<(String, String)>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "dbt".to_string(),
            output_subdir: PathBuf::from("target"),
            env: Vec::new(),
        }
    }
}

/// Where in the lifecycle a run enters the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    /// Nothing recorded yet
    Fresh,
    /// INITIALIZING already recorded by the submitter
    Initialized,
    /// RUNNING already recorded by a dispatcher launch
    Launched,
}

/// Runs workloads against unpacked artifact namespaces
#[derive(Clone)]
pub struct Executor<W, C: Clock> {
    registry: Registry,
    artifacts: ArtifactStore,
    logs: LogChannel<C>,
    lock: LockService<C>,
    workload: W,
    clock: C,
    config: Arc<ExecutorConfig>,
}

impl<W, C> Executor<W, C>
where
    W: Workload,
    C: Clock,
{
    pub fn new(
        registry: Registry,
        artifacts: ArtifactStore,
        logs: LogChannel<C>,
        lock: LockService<C>,
        workload: W,
        clock: C,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            artifacts,
            logs,
            lock,
            workload,
            clock,
            config: Arc::new(config),
        }
    }

    /// Record a run as INITIALIZING ahead of [`Executor::execute_initialized`]
    pub async fn initialize(&self, run_id: &RunId) -> Result<(), ExecuteError> {
        self.registry
            .insert_run(run_id, self.clock.now(), RunStatus::Initializing)
            .await?;
        Ok(())
    }

    /// Execute a run end to end
    ///
    /// Returns the terminal status for SUCCESS and FAILED. Unexpected
    /// errors finalize the run as SERVER_ERROR and are returned.
    pub async fn execute(
        &self,
        invocation: &WorkloadInvocation,
        input_dir: &Path,
        run_id: &RunId,
    ) -> Result<RunStatus, ExecuteError> {
        self.drive(invocation, input_dir, run_id, Entry::Fresh).await
    }

    /// Execute a run already recorded by [`Executor::initialize`]
    pub async fn execute_initialized(
        &self,
        invocation: &WorkloadInvocation,
        input_dir: &Path,
        run_id: &RunId,
    ) -> Result<RunStatus, ExecuteError> {
        self.drive(invocation, input_dir, run_id, Entry::Initialized).await
    }

    /// Execute a run a dispatcher has already marked RUNNING
    pub async fn execute_dispatched(
        &self,
        invocation: &WorkloadInvocation,
        input_dir: &Path,
        run_id: &RunId,
    ) -> Result<RunStatus, ExecuteError> {
        self.drive(invocation, input_dir, run_id, Entry::Launched).await
    }

    async fn drive(
        &self,
        invocation: &WorkloadInvocation,
        input_dir: &Path,
        run_id: &RunId,
        entry: Entry,
    ) -> Result<RunStatus, ExecuteError> {
        let span = tracing::info_span!("execute", run_id = %run_id, entry = ?entry);
        self.drive_inner(invocation, input_dir, run_id, entry)
            .instrument(span)
            .await
    }

    async fn drive_inner(
        &self,
        invocation: &WorkloadInvocation,
        input_dir: &Path,
        run_id: &RunId,
        entry: Entry,
    ) -> Result<RunStatus, ExecuteError> {
        let initialized = match entry {
            Entry::Fresh => self.initialize(run_id).await,
            Entry::Initialized | Entry::Launched => Ok(()),
        };
        // The log and lock under this id belong to the run already recorded
        if let Err(e @ ExecuteError::Registry(RegistryError::DuplicateRun(_))) = initialized {
            tracing::error!(run_id = %run_id, "run id already recorded");
            return Err(e);
        }

        let mut writer = match self.logs.writer(run_id) {
            Ok(writer) => writer,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "cannot open run log");
                self.fail_unlogged(run_id).await;
                self.release(run_id).await;
                return Err(e.into());
            }
        };

        let result = match initialized {
            Ok(()) => self.run(&mut writer, invocation, input_dir, run_id, entry).await,
            Err(e) => Err(e),
        };

        let status = match &result {
            Ok(status) => *status,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "run failed with server error");
                self.append(
                    &mut writer,
                    Level::Error,
                    names::SERVER_ERROR,
                    format!("server error: {}", e),
                );
                if let Err(e) = self.finish(run_id, RunStatus::ServerError).await {
                    tracing::error!(run_id = %run_id, error = %e, "cannot record server error");
                }
                RunStatus::ServerError
            }
        };

        if status == RunStatus::Success {
            self.persist_outputs(&mut writer, input_dir, run_id);
        }

        self.append(
            &mut writer,
            Level::Info,
            names::RUN_FINALIZED,
            format!("run finished with status {}", status),
        );
        self.append_sentinel(&mut writer, status);
        self.release(run_id).await;

        tracing::info!(run_id = %run_id, status = %status, "run finalized");
        result
    }

    /// Steps that can fail into SERVER_ERROR
    async fn run(
        &self,
        writer: &mut LogWriter,
        invocation: &WorkloadInvocation,
        input_dir: &Path,
        run_id: &RunId,
        entry: Entry,
    ) -> Result<RunStatus, ExecuteError> {
        let ctx = self.context(invocation, input_dir, run_id)?;

        if entry != Entry::Launched {
            self.registry
                .update_run_status(run_id, RunStatus::Running, None)
                .await?;
        }
        writer.append(LogEvent::new(
            self.clock.now(),
            Level::Info,
            names::RUN_STARTED,
            format!("running {}", ctx.argv().join(" ")),
        ))?;

        let (tx, mut rx) = mpsc::channel::<WorkloadEvent>(EVENT_BUFFER);
        let invoke = self.workload.invoke(&ctx, tx);
        let drain = async {
            while let Some(event) = rx.recv().await {
                writer.append(workload_log_event(self.clock.now(), event))?;
                if let Err(e) = self.lock.refresh(run_id).await {
                    tracing::warn!(run_id = %run_id, error = %e, "lock refresh failed");
                }
            }
            Ok::<_, LogError>(())
        };
        let (outcome, drained) = tokio::join!(invoke, drain);
        let outcome = outcome?;
        drained?;

        let (level, message) = match (outcome.success, outcome.exit_code) {
            (true, _) => (Level::Info, "workload succeeded".to_string()),
            (false, Some(code)) => (
                Level::Error,
                format!("workload failed with exit code {}", code),
            ),
            (false, None) => (Level::Error, "workload terminated by signal".to_string()),
        };
        writer.append(LogEvent::new(self.clock.now(), level, names::WORKLOAD_EXITED, message))?;

        let status = if outcome.success {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        self.finish(run_id, status).await?;
        Ok(status)
    }

    fn context(
        &self,
        invocation: &WorkloadInvocation,
        input_dir: &Path,
        run_id: &RunId,
    ) -> Result<WorkloadContext, ExecuteError> {
        if !input_dir.is_dir() {
            return Err(ExecuteError::MissingInput(input_dir.to_path_buf()));
        }
        let output_dir = self.artifacts.namespace(run_id).output_dir();
        std::fs::create_dir_all(&output_dir).map_err(ArtifactError::from)?;
        Ok(WorkloadContext {
            run_id: run_id.clone(),
            program: self.config.program.clone(),
            invocation: invocation.clone(),
            input_dir: input_dir.to_path_buf(),
            output_dir,
            env: self.config.env.clone(),
        })
    }

    async fn finish(&self, run_id: &RunId, status: RunStatus) -> Result<(), RegistryError> {
        self.registry
            .update_run_status(run_id, status, Some(self.clock.now()))
            .await
    }

    /// Best effort: a failed copy is logged and leaves the status alone
    fn persist_outputs(&self, writer: &mut LogWriter, input_dir: &Path, run_id: &RunId) {
        let source = input_dir.join(&self.config.output_subdir);
        if !source.is_dir() {
            return;
        }
        let target = self.artifacts.namespace(run_id).output_dir();
        match copy_dir(&source, &target) {
            Ok(files) => tracing::info!(run_id = %run_id, files, "outputs persisted"),
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "output persistence failed");
                self.append(
                    writer,
                    Level::Warn,
                    names::ARTIFACT_PERSIST_FAILED,
                    format!("could not persist outputs: {}", e),
                );
            }
        }
    }

    fn append(&self, writer: &mut LogWriter, level: Level, name: &str, message: String) {
        let event = LogEvent::new(self.clock.now(), level, name, message);
        if let Err(e) = writer.append(event) {
            tracing::warn!(run_id = %writer.run_id(), event = name, error = %e, "log append failed");
        }
    }

    fn append_sentinel(&self, writer: &mut LogWriter, status: RunStatus) {
        let event = LogEvent::sentinel(self.clock.now(), status.as_str());
        if let Err(e) = writer.append(event) {
            tracing::error!(run_id = %writer.run_id(), error = %e, "sentinel append failed");
        }
    }

    /// Record SERVER_ERROR when the log itself is unusable
    async fn fail_unlogged(&self, run_id: &RunId) {
        if let Err(e) = self.finish(run_id, RunStatus::ServerError).await {
            tracing::error!(run_id = %run_id, error = %e, "cannot record server error");
        }
    }

    async fn release(&self, run_id: &RunId) {
        if let Err(e) = self.lock.release_run(run_id).await {
            tracing::error!(run_id = %run_id, error = %e, "lock release failed");
        }
    }
}

/// Log entry for a workload event
///
/// Only the executor ends a log. A workload event carrying the sentinel name
/// is kept as plain output with its original name in the message.
fn workload_log_event(timestamp: DateTime<Utc>, event: WorkloadEvent) -> LogEvent {
    if event.name == names::COMMAND_COMPLETED {
        let message = format!("[{}] {}", event.name, event.message);
        return LogEvent::new(timestamp, event.level, names::WORKLOAD_OUTPUT, message);
    }
    LogEvent::new(timestamp, event.level, event.name, event.message)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
