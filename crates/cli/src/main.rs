// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rj - Remote Jobs CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod completions;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{artifacts, history, lock, logs, run, schedules, status, Settings};
use std::process::ExitCode;

use crate::client::ApiClient;
use crate::completions::CompletionsArgs;
use crate::error::RjError;
use crate::output::{OutputFormat, ServerStatus};

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

#[derive(Parser)]
#[command(
    name = "rj",
    version,
    about = "Remote Jobs - run data-transformation jobs on a remote server"
)]
struct Cli {
    /// rjd server URL
    #[arg(long, global = true, env = "RJ_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Requester identity [default: $USER]
    #[arg(long, global = true, env = "RJ_USER")]
    user: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job, then follow its logs
    Run(run::RunArgs),
    /// Follow the logs of a run
    Logs(logs::LogsArgs),
    /// Show the status of a run
    Status(status::StatusArgs),
    /// List recent runs
    History(history::HistoryArgs),
    /// Check that the server is up
    Check,
    /// Show who holds the run lock
    Lock,
    /// Release the run lock
    Unlock,
    /// Manage schedules
    Schedules {
        #[command(subcommand)]
        command: schedules::SchedulesCommand,
    },
    /// List the files `rj run` would upload
    Artifacts(artifacts::ArtifactsArgs),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<RjError>() {
                Some(err) => eprint!("{}", err),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let settings = Settings {
        server_url: cli.server_url,
        user: cli.user.unwrap_or_else(default_user),
        format: cli.format,
    };

    // Offline commands
    match cli.command {
        Commands::Completions(args) => {
            completions::generate_completions::<Cli>(args.shell);
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Artifacts(args) => {
            artifacts::handle(args, &settings)?;
            return Ok(ExitCode::SUCCESS);
        }
        command => {
            let client = ApiClient::new(&settings.server_url)?;
            run_online(&client, command, &settings).await
        }
    }
}

async fn run_online(
    client: &ApiClient,
    command: Commands,
    settings: &Settings,
) -> Result<ExitCode> {
    match command {
        Commands::Run(args) => return run::handle(client, args, settings).await,
        Commands::Logs(args) => logs::handle(client, args, settings).await?,
        Commands::Status(args) => status::handle(client, args, settings).await?,
        Commands::History(args) => history::handle(client, args, settings).await?,
        Commands::Check => {
            let check = client.check().await.map_err(RjError::from)?;
            output::print(&ServerStatus::new(client.base_url(), check), settings.format);
        }
        Commands::Lock => lock::show(client, settings).await?,
        Commands::Unlock => lock::unlock(client).await?,
        Commands::Schedules { command } => schedules::handle(client, command, settings).await?,
        Commands::Artifacts(_) | Commands::Completions(_) => {}
    }
    Ok(ExitCode::SUCCESS)
}
