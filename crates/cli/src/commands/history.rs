// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rj history` - recent runs, newest first

use anyhow::Result;
use clap::Args;

use super::Settings;
use crate::client::ApiClient;
use crate::error::RjError;
use crate::output::{self, RunRow};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only runs of this project
    #[arg(long)]
    pub project: Option<String>,

    /// Number of runs to show
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Number of newest runs to skip
    #[arg(long, default_value_t = 0)]
    pub skip: u32,
}

pub async fn handle(client: &ApiClient, args: HistoryArgs, settings: &Settings) -> Result<()> {
    let runs = client
        .history(args.skip, args.limit, args.project.as_deref())
        .await
        .map_err(RjError::from)?;
    let rows: Vec<RunRow> = runs.into_iter().map(RunRow).collect();
    output::print_list(&rows, RunRow::HEADER, "No runs", settings.format);
    Ok(())
}
