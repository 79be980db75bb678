// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote Jobs Daemon (rjd)
//!
//! Serves the HTTP API by default. `rjd job --run-id <id>` executes one
//! dispatched run against the same state directory and exits.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rj_core::{RunId, RunStatus};
use rj_daemon::lifecycle::{self, remove_pid_file};
use rj_daemon::{Config, LifecycleError, Paths};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// How long open requests get to finish after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "rjd", version, about = "Remote Jobs daemon")]
struct Cli {
    /// State directory [default: $RJ_STATE_DIR, then $XDG_STATE_HOME/rj]
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Configuration file [default: <state-dir>/rjd.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Execute a dispatched run and exit
    Job {
        #[arg(long)]
        run_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let paths = Paths::resolve(cli.state_dir)?.with_config_path(cli.config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(paths).await,
        Command::Job { run_id } => job(paths, RunId::new(run_id)).await,
    }
}

async fn serve(paths: Paths) -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Marker goes in before tracing so readers can find this attempt
    write_startup_marker(&paths)?;

    let config = match Config::load(&paths.config_path).and_then(Config::apply_env) {
        Ok(config) => config,
        Err(e) => {
            write_startup_error(&paths, &e);
            return Err(e.into());
        }
    };

    let log_guard = setup_logging(&paths)?;
    info!("Starting rjd with state in {}", paths.state_dir.display());

    let daemon = match lifecycle::startup(&paths, &config).await {
        Ok(d) => d,
        Err(e) => {
            // Synchronous write; the tracing writer may not flush before exit
            write_startup_error(&paths, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Daemon ready, listening on {}", daemon.local_addr()?);
    // Signal ready for a supervising parent
    println!("READY");

    let stop = Arc::new(Notify::new());
    let shutdown = {
        let stop = Arc::clone(&stop);
        async move { stop.notified().await }
    };
    let mut server = tokio::spawn(daemon.serve(shutdown));

    tokio::select! {
        result = &mut server => {
            finish(result)?;
            info!("Daemon stopped");
            return Ok(ExitCode::SUCCESS);
        }
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
    }

    stop.notify_one();
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(result) => finish(result)?,
        Err(_) => {
            warn!("Open requests did not finish within {:?}", SHUTDOWN_GRACE);
            server.abort();
            remove_pid_file(&paths);
        }
    }

    info!("Daemon stopped");
    Ok(ExitCode::SUCCESS)
}

fn finish(
    result: Result<Result<(), LifecycleError>, tokio::task::JoinError>,
) -> Result<(), Box<dyn std::error::Error>> {
    result??;
    Ok(())
}

async fn job(paths: Paths, run_id: RunId) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load(&paths.config_path)?.apply_env()?;
    let _log_guard = setup_logging(&paths)?;

    let runtime = lifecycle::open_runtime(&paths, &config).await?;
    info!(run_id = %run_id, "executing dispatched run");
    let status = runtime.run_dispatched(&run_id).await?;
    info!(run_id = %run_id, status = %status, "dispatched run finished");

    Ok(match status {
        RunStatus::Success => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- rjd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- rjd: starting (pid: ";

/// Append the startup marker to the daemon log
fn write_startup_marker(paths: &Paths) -> Result<(), LifecycleError> {
    use std::io::Write;

    std::fs::create_dir_all(&paths.state_dir)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write a startup error straight to the log file
fn write_startup_error(paths: &Paths, error: &dyn std::fmt::Display) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    paths: &Paths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&paths.state_dir)?;

    let file_name = paths
        .log_path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("rjd.log"));
    let file_appender = tracing_appender::rolling::never(&paths.state_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}
