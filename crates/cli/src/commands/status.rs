// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rj status <run-id>` - show one run

use anyhow::Result;
use clap::Args;
use reqwest::StatusCode;

use super::Settings;
use crate::client::{ApiClient, ClientError};
use crate::error::RjError;
use crate::output;

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub run_id: String,
}

pub async fn handle(client: &ApiClient, args: StatusArgs, settings: &Settings) -> Result<()> {
    let detail = match client.status(&args.run_id).await {
        Ok(detail) => detail,
        Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND => {
            return Err(RjError::not_found(&format!("Run {}", args.run_id)).into());
        }
        Err(e) => return Err(RjError::from(e).into()),
    };
    output::print(&detail, settings.format);
    Ok(())
}
