// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rj run [options] -- <command>...` - submit a job and follow it

use anyhow::{bail, Context, Result};
use clap::Args;
use rj_command::{canonicalize, KnownParameters};
use rj_core::{Level, RunOptions, RunStatus, Trigger, WorkloadInvocation};
use rj_storage::{digest, pack_to_vec};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::artifacts::ignore_set;
use super::logs::{follow, parse_level, Follow};
use super::Settings;
use crate::client::{ApiClient, Submission};
use crate::error::RjError;
use crate::output::OutputFormat;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workload command line, e.g. `dbt build -s orders`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Project directory to upload
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Project name [default: name of the project directory]
    #[arg(long)]
    pub project: Option<String>,

    /// Cron expression; omit to run now
    #[arg(long, value_name = "CRON")]
    pub schedule: Option<String>,

    /// Name of the schedule
    #[arg(long, requires = "schedule")]
    pub schedule_name: Option<String>,

    /// Description of the schedule
    #[arg(long, requires = "schedule")]
    pub schedule_description: Option<String>,

    /// Execution backend the job asks for
    #[arg(long, default_value = "local")]
    pub provider: String,

    /// Backend-specific setting (repeatable)
    #[arg(long = "provider-config", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub provider_config: Vec<(String, String)>,

    /// Additional ignore glob (repeatable)
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// TOML description of the workload's commands and flags
    #[arg(long, value_name = "PATH")]
    pub known_params: Option<PathBuf>,

    /// Lowest log level to stream
    #[arg(long, value_parser = parse_level)]
    pub level: Option<Level>,

    /// Print the run id and return without streaming logs
    #[arg(long)]
    pub detach: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid key=value: no `=` found in `{s}`"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Rejoin words into one command line, quoting where the tokenizer needs it
pub fn shell_join(words: &[String]) -> String {
    words
        .iter()
        .map(|word| {
            let plain = !word.is_empty()
                && word
                    .chars()
                    .all(|c| !c.is_whitespace() && !matches!(c, '\'' | '"' | '\\'));
            if plain {
                word.clone()
            } else {
                format!("'{}'", word.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn load_known_params(path: Option<&Path>) -> Result<KnownParameters> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(KnownParameters::from_toml(&content)?)
        }
        None => Ok(KnownParameters::default()),
    }
}

fn project_name(args: &RunArgs) -> Result<String> {
    if let Some(project) = &args.project {
        return Ok(project.clone());
    }
    let dir = args
        .project_dir
        .canonicalize()
        .with_context(|| format!("resolving {}", args.project_dir.display()))?;
    match dir.file_name() {
        Some(name) => Ok(name.to_string_lossy().into_owned()),
        None => bail!("cannot name a project at {}; pass --project", dir.display()),
    }
}

/// Canonical invocation for the command words
pub fn invocation(args: &RunArgs) -> Result<WorkloadInvocation> {
    let known = load_known_params(args.known_params.as_deref())?;
    Ok(canonicalize(&shell_join(&args.command), &known)?)
}

/// Options sent with the submission
pub fn options(args: &RunArgs, settings: &Settings, project: String) -> Result<RunOptions> {
    let mut options = RunOptions::new(project, settings.user.clone());
    options.server_url = settings.server_url.clone();
    options.cloud_provider = args.provider.clone();
    options.provider_config = args.provider_config.iter().cloned().collect::<BTreeMap<_, _>>();
    if let Some(schedule) = &args.schedule {
        // Fail before packing and uploading
        Trigger::parse(schedule)?;
        options.cron_schedule = schedule.clone();
        options.schedule_name = args.schedule_name.clone();
        options.schedule_description = args.schedule_description.clone();
    }
    Ok(options)
}

pub async fn handle(client: &ApiClient, args: RunArgs, settings: &Settings) -> Result<ExitCode> {
    let invocation = invocation(&args)?;
    let mut options = options(&args, settings, project_name(&args)?)?;

    let ignore = ignore_set(&args.project_dir, &args.ignore)?;
    let (archive, summary) = pack_to_vec(&args.project_dir, &ignore)?;
    options.artifact_digest = Some(digest(&archive));
    tracing::info!(files = summary.files.len(), bytes = summary.bytes, "packed project");

    let submission = client
        .submit(&invocation, &options, archive)
        .await
        .map_err(RjError::from)?;

    let run_id = match submission {
        Submission::Schedule(schedule_id) => {
            println!("Scheduled {} ({})", schedule_id, options.cron_schedule);
            return Ok(ExitCode::SUCCESS);
        }
        Submission::Run(run_id) => run_id,
    };

    eprintln!("Started run {}: {}", run_id, invocation);
    if args.detach {
        println!("{}", run_id);
        return Ok(ExitCode::SUCCESS);
    }

    match follow(client, run_id.as_str(), args.level, settings.format).await? {
        Follow::Detached => {
            eprintln!("Detached; run {} continues on the server", run_id);
            return Ok(ExitCode::SUCCESS);
        }
        Follow::Closed => tracing::warn!(run_id = %run_id, "log stream closed before completion"),
        Follow::Completed => {}
    }

    let detail = client.status(run_id.as_str()).await.map_err(RjError::from)?;
    let status = detail.record.run_status;
    if settings.format == OutputFormat::Text {
        eprintln!("Run {} finished: {}", run_id, status);
    }
    Ok(exit_code(status))
}

/// Only a successful run exits zero
pub fn exit_code(status: RunStatus) -> ExitCode {
    if status == RunStatus::Success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
