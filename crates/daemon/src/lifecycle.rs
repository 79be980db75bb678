// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

use fs2::FileExt;
use rj_adapters::{
    CloudScheduler, ContainerInstanceDispatcher, Dispatcher, LocalProcessDispatcher,
    NoOpScheduler, ProcessWorkload, Scheduler, ServerlessJobDispatcher, TracedDispatcher,
    TracedScheduler, TracedWorkload,
};
use rj_core::{SystemClock, UlidIdGen};
use rj_engine::{Runtime, RuntimeDeps, RuntimeError};
use rj_storage::{ArtifactStore, Registry, RegistryError};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::{api_routes, AppState, Backends};
use crate::config::{
    token_from_env, Config, ConfigError, DispatchBackend, DispatchConfig, Paths, SchedulerBackend,
    SchedulerConfig,
};

/// Daemon runtime with concrete adapter types (wrapped with tracing)
pub type DaemonRuntime = Runtime<
    TracedWorkload<ProcessWorkload>,
    TracedDispatcher<Dispatcher>,
    TracedScheduler<Scheduler>,
    SystemClock,
    UlidIdGen,
>;

/// Production adapter set
pub struct Live;

impl Backends for Live {
    type Workload = TracedWorkload<ProcessWorkload>;
    type Dispatcher = TracedDispatcher<Dispatcher>;
    type Scheduler = TracedScheduler<Scheduler>;
    type Clock = SystemClock;
    type Ids = UlidIdGen;
}

/// Daemon state during operation
pub struct DaemonState {
    pub paths: Paths,
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub listener: TcpListener,
    pub runtime: DaemonRuntime,
}

impl DaemonState {
    pub fn local_addr(&self) -> Result<SocketAddr, LifecycleError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn app_state(&self) -> AppState<Live> {
        AppState::new(self.runtime.clone())
    }

    /// Serve the API until `shutdown` resolves and open requests finish
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), LifecycleError> {
        let app = api_routes(self.app_state());
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        remove_pid_file(&self.paths);
        Ok(())
    }

    /// Remove the PID file; the lock itself goes with `lock_file`
    pub fn shutdown(&self) {
        remove_pid_file(&self.paths);
    }
}

pub fn remove_pid_file(paths: &Paths) {
    if paths.pid_path.exists() {
        if let Err(e) = std::fs::remove_file(&paths.pid_path) {
            warn!("Failed to remove PID file: {}", e);
        }
    }
    info!("Daemon shutdown complete");
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("Could not locate the rjd executable: {0}")]
    NoExecutable(std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(paths: &Paths, config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(paths, config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            cleanup_on_failure(paths, &e);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(paths: &Paths, config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&paths.state_dir)?;

    // 2. Acquire lock file FIRST - one daemon per state directory.
    // No truncation until locked: a refused start keeps the holder's PID.
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&paths.pid_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Registry, artifacts and adapters
    let runtime = open_runtime(paths, config).await?;

    // 4. Settle runs a previous process left behind
    let recovered = runtime.recover_interrupted().await?;
    if recovered > 0 {
        warn!("Finalized {} interrupted runs as SERVER_ERROR", recovered);
    }

    // 5. Bind LAST - only after everything else is ready
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.listen, e))?;

    info!(
        backend = runtime.backend(),
        state_dir = %paths.state_dir.display(),
        "Daemon started"
    );

    Ok(DaemonState {
        paths: paths.clone(),
        config: config.clone(),
        lock_file,
        listener,
        runtime,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(paths: &Paths, error: &LifecycleError) {
    // The PID file belongs to the running daemon when the lock was refused
    if matches!(error, LifecycleError::LockFailed(_)) {
        return;
    }
    if paths.pid_path.exists() {
        let _ = std::fs::remove_file(&paths.pid_path);
    }
}

/// Open the registry and artifact store and wire the configured adapters
///
/// Used both by the server and by `rjd job`, which shares its state directory.
pub async fn open_runtime(paths: &Paths, config: &Config) -> Result<DaemonRuntime, LifecycleError> {
    config.validate()?;
    std::fs::create_dir_all(&paths.artifacts_root)?;
    let registry = Registry::open(&paths.registry_path).await?;

    let dispatcher = build_dispatcher(&config.dispatch, paths)?.map(TracedDispatcher::new);
    let scheduler = TracedScheduler::new(build_scheduler(&config.scheduler));

    Ok(Runtime::new(
        RuntimeDeps {
            registry,
            artifacts: ArtifactStore::new(&paths.artifacts_root),
            workload: TracedWorkload::new(ProcessWorkload::new()),
            dispatcher,
            scheduler,
        },
        SystemClock,
        UlidIdGen::new(),
        config.runtime_config(),
    ))
}

/// Dispatcher for the configured backend; `None` runs in-process
pub fn build_dispatcher(
    config: &DispatchConfig,
    paths: &Paths,
) -> Result<Option<Dispatcher>, LifecycleError> {
    let token = || token_from_env(config.token_env.as_deref());
    let api_url = config.api_url.clone().unwrap_or_default();
    let image = config.image.clone().unwrap_or_default();
    let dispatcher = match config.backend {
        DispatchBackend::InProcess => return Ok(None),
        DispatchBackend::LocalProcess => {
            let program: PathBuf = std::env::current_exe().map_err(LifecycleError::NoExecutable)?;
            Dispatcher::LocalProcess(
                LocalProcessDispatcher::new(program).with_args(job_args(paths)),
            )
        }
        DispatchBackend::ServerlessJob => Dispatcher::ServerlessJob(
            ServerlessJobDispatcher::new(api_url, image)
                .with_region(config.region.clone())
                .with_token(token()),
        ),
        DispatchBackend::ContainerInstance => Dispatcher::ContainerInstance(
            ContainerInstanceDispatcher::new(api_url, image)
                .with_region(config.region.clone())
                .with_token(token()),
        ),
    };
    Ok(Some(dispatcher))
}

/// Flags that point a local `rjd job` at this daemon's state
pub fn job_args(paths: &Paths) -> Vec<String> {
    let mut args = vec![
        "--state-dir".to_string(),
        paths.state_dir.display().to_string(),
    ];
    if paths.config_path.exists() {
        args.push("--config".to_string());
        args.push(paths.config_path.display().to_string());
    }
    args
}

pub fn build_scheduler(config: &SchedulerConfig) -> Scheduler {
    match config.backend {
        SchedulerBackend::Disabled => Scheduler::NoOp(NoOpScheduler::new()),
        SchedulerBackend::Cloud => Scheduler::Cloud(
            CloudScheduler::new(config.api_url.clone().unwrap_or_default())
                .with_time_zone(config.time_zone.clone())
                .with_token(token_from_env(config.token_env.as_deref())),
        ),
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
