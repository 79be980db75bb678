// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the Remote Jobs engine
//!
//! Owns the lock, log channel and executor, and implements submission,
//! dispatch, schedule registration and schedule triggers on top of them.

use crate::error::RuntimeError;
use crate::executor::{Executor, ExecutorConfig};
use crate::lock::LockService;
use crate::log_channel::{LogChannel, LogTail, DEFAULT_POLL_INTERVAL};
use crate::schedules;
use rj_adapters::{
    BatchDispatcher, CronScheduler, DispatchError, DispatchRequest, ScheduleEntry, Workload,
};
use rj_core::log::names;
use rj_core::{
    Clock, IdGen, Level, LockConfig, LockRecord, LogEvent, LogFilter, RunConfiguration, RunId,
    RunOptions, RunRecord, RunStatus, Trigger, WorkloadInvocation,
};
use rj_storage::{digest, verify_digest, ArtifactMetadata, ArtifactStore, Registry, RegistryError};
use serde::Serialize;
use std::time::Duration;

/// Runtime path and tuning configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub lock: LockConfig,
    /// Delay between polls of a log with nothing new
    pub poll_interval: Duration,
    pub executor: ExecutorConfig,
    /// Public URL schedule triggers call; the submitting client's URL when unset
    pub server_url: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            executor: ExecutorConfig::default(),
            server_url: None,
        }
    }
}

/// Runtime adapter dependencies
pub struct RuntimeDeps<W, D, S> {
    pub registry: Registry,
    pub artifacts: ArtifactStore,
    pub workload: W,
    /// Launch runs through this backend instead of in-process
    pub dispatcher: Option<D>,
    pub scheduler: S,
}

/// Result of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Run(RunId),
    Schedule(RunId),
}

/// Status of one run with the configuration it ran with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub record: RunRecord,
    pub configuration: Option<RunConfiguration>,
}

/// Runtime that coordinates runs
#[derive(Clone)]
pub struct Runtime<W, D, S, C: Clock, I> {
    registry: Registry,
    artifacts: ArtifactStore,
    executor: Executor<W, C>,
    lock: LockService<C>,
    logs: LogChannel<C>,
    dispatcher: Option<D>,
    scheduler: S,
    clock: C,
    ids: I,
    server_url: Option<String>,
}

impl<W, D, S, C, I> Runtime<W, D, S, C, I>
where
    W: Workload,
    D: BatchDispatcher,
    S: CronScheduler,
    C: Clock,
    I: IdGen,
{
    pub fn new(deps: RuntimeDeps<W, D, S>, clock: C, ids: I, config: RuntimeConfig) -> Self {
        let lock = LockService::new(deps.registry.clone(), clock.clone(), config.lock);
        let logs = LogChannel::new(deps.artifacts.clone())
            .with_lock(lock.clone())
            .with_poll_interval(config.poll_interval);
        let executor = Executor::new(
            deps.registry.clone(),
            deps.artifacts.clone(),
            logs.clone(),
            lock.clone(),
            deps.workload,
            clock.clone(),
            config.executor,
        );
        Self {
            registry: deps.registry,
            artifacts: deps.artifacts,
            executor,
            lock,
            logs,
            dispatcher: deps.dispatcher,
            scheduler: deps.scheduler,
            clock,
            ids,
            server_url: config.server_url.filter(|url| !url.is_empty()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Name of the backend runs are launched on
    pub fn backend(&self) -> &'static str {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.backend(),
            None => "in_process",
        }
    }

    /// Accept a run or schedule submission
    ///
    /// An immediate run takes the lock, stores its artifacts and starts in
    /// the background; the call returns once the run is INITIALIZING (or
    /// RUNNING when dispatched). A schedule stores its template and
    /// registers a trigger.
    pub async fn submit(
        &self,
        invocation: WorkloadInvocation,
        mut options: RunOptions,
        archive: Vec<u8>,
    ) -> Result<Submitted, RuntimeError> {
        let archive_digest = match options.artifact_digest.as_deref() {
            Some(expected) => verify_digest(&archive, expected)?,
            None => digest(&archive),
        };
        match Trigger::parse(&options.cron_schedule)? {
            Trigger::Now => {
                let run_id = self
                    .submit_run(invocation, options, archive, archive_digest)
                    .await?;
                Ok(Submitted::Run(run_id))
            }
            Trigger::Cron(expr) => {
                options.cron_schedule = expr.as_str().to_string();
                let schedule_id = self
                    .submit_schedule(invocation, options, archive, archive_digest)
                    .await?;
                Ok(Submitted::Schedule(schedule_id))
            }
        }
    }

    async fn submit_run(
        &self,
        invocation: WorkloadInvocation,
        options: RunOptions,
        archive: Vec<u8>,
        archive_digest: String,
    ) -> Result<RunId, RuntimeError> {
        let run_id = self.ids.run_id();
        self.lock.acquire(&options.requester, &run_id).await?;

        let now = self.clock.now();
        let metadata = metadata(&run_id, &options, &archive, archive_digest, now);
        let config = options.into_configuration(run_id.clone(), invocation, now);
        let stored = async {
            self.store_upload(archive, metadata).await?;
            self.registry.insert_run_configuration(&config).await?;
            Ok::<_, RuntimeError>(())
        }
        .await;
        if let Err(e) = stored {
            self.release_quietly(&run_id).await;
            return Err(e);
        }

        tracing::info!(run_id = %run_id, requester = %config.requester, "run submitted");
        self.start(config).await?;
        Ok(run_id)
    }

    async fn submit_schedule(
        &self,
        invocation: WorkloadInvocation,
        options: RunOptions,
        archive: Vec<u8>,
        archive_digest: String,
    ) -> Result<RunId, RuntimeError> {
        let schedule_id = self.ids.schedule_id();
        let now = self.clock.now();
        let metadata = metadata(&schedule_id, &options, &archive, archive_digest, now);
        let config = options.into_configuration(schedule_id.clone(), invocation, now);

        self.store_upload(archive, metadata).await?;
        self.registry.insert_run_configuration(&config).await?;
        self.register_trigger(&config).await?;

        tracing::info!(schedule_id = %schedule_id, cron = ?config.cron_schedule, "schedule submitted");
        Ok(schedule_id)
    }

    async fn store_upload(
        &self,
        archive: Vec<u8>,
        metadata: ArtifactMetadata,
    ) -> Result<(), RuntimeError> {
        let artifacts = self.artifacts.clone();
        tokio::task::spawn_blocking(move || artifacts.store_upload(&archive, &metadata)).await??;
        Ok(())
    }

    async fn register_trigger(&self, config: &RunConfiguration) -> Result<(), RuntimeError> {
        let server_url = self.server_url.as_deref().unwrap_or(&config.server_url);
        let url = schedules::trigger_url(server_url, &config.run_id);
        let cron = config.cron_schedule.as_deref().unwrap_or_default();
        self.scheduler
            .create_or_update(
                &schedules::entry_name(config),
                cron,
                &url,
                config.schedule_description.as_deref(),
            )
            .await?;
        Ok(())
    }

    /// Materialize a fresh run from a schedule template and start it
    ///
    /// The template's configuration and artifacts are copied, never changed.
    pub async fn trigger(&self, schedule_id: &RunId) -> Result<RunId, RuntimeError> {
        let template = self.registry.load_run_configuration(schedule_id).await?;
        if !template.is_schedule() {
            return Err(RegistryError::NotASchedule(schedule_id.clone()).into());
        }

        let run_id = self.ids.run_id();
        self.lock.acquire(&template.requester, &run_id).await?;

        let now = self.clock.now();
        let prepared = async {
            let config = self
                .registry
                .materialize_schedule(schedule_id, run_id.clone(), now)
                .await?;
            let artifacts = self.artifacts.clone();
            let (source, target) = (schedule_id.clone(), run_id.clone());
            tokio::task::spawn_blocking(move || artifacts.copy_namespace(&source, &target, now))
                .await??;
            Ok::<_, RuntimeError>(config)
        }
        .await;
        let config = match prepared {
            Ok(config) => config,
            Err(e) => {
                self.release_quietly(&run_id).await;
                return Err(e);
            }
        };

        tracing::info!(schedule_id = %schedule_id, run_id = %run_id, "schedule triggered");
        self.start(config).await?;
        Ok(run_id)
    }

    /// Record INITIALIZING and hand the run to its executor
    async fn start(&self, config: RunConfiguration) -> Result<(), RuntimeError> {
        if let Err(e) = self.executor.initialize(&config.run_id).await {
            self.release_quietly(&config.run_id).await;
            return Err(e.into());
        }
        match &self.dispatcher {
            Some(dispatcher) => self.dispatch(dispatcher, &config).await,
            None => {
                self.spawn_execution(config);
                Ok(())
            }
        }
    }

    fn spawn_execution(&self, config: RunConfiguration) {
        let executor = self.executor.clone();
        let input_dir = self.artifacts.namespace(&config.run_id).input_dir();
        tokio::spawn(async move {
            let result = executor
                .execute_initialized(&config.invocation, &input_dir, &config.run_id)
                .await;
            if let Err(e) = result {
                tracing::error!(run_id = %config.run_id, error = %e, "background run failed");
            }
        });
    }

    /// Create and launch the job, then mark the run RUNNING
    async fn dispatch(
        &self,
        dispatcher: &D,
        config: &RunConfiguration,
    ) -> Result<(), RuntimeError> {
        let run_id = &config.run_id;
        let namespace = self.artifacts.namespace(run_id);
        let mut request = DispatchRequest::new(
            run_id.clone(),
            config.invocation.clone(),
            namespace.root().display().to_string(),
        );
        request.provider_config = config.provider_config.clone();

        let launched = async {
            let handle = dispatcher.create(&request).await?;
            dispatcher.launch(&handle).await?;
            Ok::<_, DispatchError>(handle)
        }
        .await;
        let handle = match launched {
            Ok(handle) => handle,
            Err(e) => {
                self.fail_run(run_id, &e.to_string()).await;
                return Err(e.into());
            }
        };

        match self
            .registry
            .update_run_status(run_id, RunStatus::Running, None)
            .await
        {
            Ok(()) => {}
            // The job already finished and recorded its own terminal status
            Err(RegistryError::Transition { .. }) => {
                tracing::debug!(run_id = %run_id, "run moved past RUNNING before launch returned");
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(
            run_id = %run_id,
            backend = dispatcher.backend(),
            job_id = %handle.job_id,
            "run dispatched"
        );
        Ok(())
    }

    /// Execute a dispatched run in this process
    ///
    /// Entry point of a launched job. The run is already RUNNING and holds
    /// the lock; both are settled here when the workload finishes.
    pub async fn run_dispatched(&self, run_id: &RunId) -> Result<RunStatus, RuntimeError> {
        let config = match self.registry.load_run_configuration(run_id).await {
            Ok(config) => config,
            Err(e) => {
                self.fail_run(run_id, &e.to_string()).await;
                return Err(e.into());
            }
        };
        let input_dir = self.artifacts.namespace(run_id).input_dir();
        Ok(self
            .executor
            .execute_dispatched(&config.invocation, &input_dir, run_id)
            .await?)
    }

    /// Finalize a run that never reached the executor
    async fn fail_run(&self, run_id: &RunId, message: &str) {
        tracing::error!(run_id = %run_id, error = message, "run failed before execution");
        let now = self.clock.now();
        if let Err(e) = self
            .registry
            .update_run_status(run_id, RunStatus::ServerError, Some(now))
            .await
        {
            tracing::warn!(run_id = %run_id, error = %e, "cannot record server error");
        }
        let events = [
            LogEvent::new(now, Level::Error, names::SERVER_ERROR, message),
            LogEvent::sentinel(now, RunStatus::ServerError.as_str()),
        ];
        for event in events {
            if let Err(e) = self.logs.append(run_id, event) {
                tracing::warn!(run_id = %run_id, error = %e, "log append failed");
            }
        }
        self.release_quietly(run_id).await;
    }

    async fn release_quietly(&self, run_id: &RunId) {
        if let Err(e) = self.lock.release_run(run_id).await {
            tracing::error!(run_id = %run_id, error = %e, "lock release failed");
        }
    }

    /// Finalize runs a previous server process left unfinished
    ///
    /// Only in-process execution is recovered; a dispatched job may still
    /// be running on its backend. In-process runs never outlive their
    /// server, so any lock still held at this point is stale.
    pub async fn recover_interrupted(&self) -> Result<usize, RuntimeError> {
        if self.dispatcher.is_some() {
            return Ok(0);
        }
        let unfinished = self.registry.list_unfinished().await?;
        for record in &unfinished {
            self.fail_run(&record.run_id, "interrupted by server restart")
                .await;
        }
        if !unfinished.is_empty() {
            tracing::warn!(count = unfinished.len(), "recovered interrupted runs");
        }

        if let Some(stale) = self.lock.load().await? {
            self.lock.release().await?;
            tracing::warn!(
                holder = %stale.holder,
                run_id = %stale.run_id,
                "released lock left by previous server"
            );
        }
        Ok(unfinished.len())
    }

    pub async fn status(&self, run_id: &RunId) -> Result<RunSummary, RuntimeError> {
        let record = self
            .registry
            .get_run(run_id)
            .await?
            .ok_or_else(|| RuntimeError::RunNotFound(run_id.clone()))?;
        let configuration = match self.registry.load_run_configuration(run_id).await {
            Ok(config) => Some(config),
            Err(RegistryError::ConfigurationNotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(RunSummary {
            record,
            configuration,
        })
    }

    pub async fn history(
        &self,
        skip: u32,
        limit: u32,
        project: Option<&str>,
    ) -> Result<Vec<RunRecord>, RuntimeError> {
        Ok(self.registry.list_runs(skip, limit, project).await?)
    }

    /// Tail a known run's log
    pub async fn tail(
        &self,
        run_id: &RunId,
        filter: LogFilter,
    ) -> Result<LogTail<C>, RuntimeError> {
        if self.registry.get_run(run_id).await?.is_none() {
            return Err(RuntimeError::RunNotFound(run_id.clone()));
        }
        Ok(self.logs.tail(run_id, filter))
    }

    /// Administrative unlock; returns whether a lock was held
    pub async fn unlock(&self) -> Result<bool, RuntimeError> {
        Ok(self.lock.release().await?)
    }

    pub async fn lock_info(&self) -> Result<Option<LockRecord>, RuntimeError> {
        Ok(self.lock.load().await?)
    }

    pub async fn schedules(&self) -> Result<Vec<ScheduleEntry>, RuntimeError> {
        Ok(self.scheduler.list().await?)
    }

    /// Remove a schedule trigger; returns whether it existed
    pub async fn delete_schedule(&self, name: &str) -> Result<bool, RuntimeError> {
        Ok(self.scheduler.delete(name).await?)
    }
}

fn metadata(
    id: &RunId,
    options: &RunOptions,
    archive: &[u8],
    archive_digest: String,
    created_at: chrono::DateTime<chrono::Utc>,
) -> ArtifactMetadata {
    ArtifactMetadata {
        run_id: id.clone(),
        project: options.project.clone(),
        requester: options.requester.clone(),
        created_at,
        archive_digest,
        archive_bytes: archive.len() as u64,
        source_schedule: None,
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
