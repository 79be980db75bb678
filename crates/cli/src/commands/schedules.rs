// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rj schedules list|delete`

use anyhow::Result;
use clap::Subcommand;
use reqwest::StatusCode;

use super::Settings;
use crate::client::{ApiClient, ClientError};
use crate::error::RjError;
use crate::output::{self, ScheduleRow};

#[derive(Subcommand, Debug)]
pub enum SchedulesCommand {
    /// List registered schedules
    List,
    /// Remove a schedule's trigger
    Delete {
        /// Schedule name as shown by `rj schedules list`
        name: String,
    },
}

pub async fn handle(
    client: &ApiClient,
    command: SchedulesCommand,
    settings: &Settings,
) -> Result<()> {
    match command {
        SchedulesCommand::List => {
            let entries = client.schedules().await.map_err(RjError::from)?;
            let rows: Vec<ScheduleRow> = entries.into_iter().map(ScheduleRow).collect();
            output::print_list(&rows, ScheduleRow::HEADER, "No schedules", settings.format);
        }
        SchedulesCommand::Delete { name } => match client.delete_schedule(&name).await {
            Ok(message) => println!("{}", message),
            Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND => {
                return Err(RjError::not_found(&format!("Schedule {}", name)).into());
            }
            Err(e) => return Err(RjError::from(e).into()),
        },
    }
    Ok(())
}
