// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rj lock` and `rj unlock`

use anyhow::Result;

use super::Settings;
use crate::client::ApiClient;
use crate::error::RjError;
use crate::output::{self, LockView, OutputFormat};

/// Show who holds the lock
pub async fn show(client: &ApiClient, settings: &Settings) -> Result<()> {
    match client.lock().await.map_err(RjError::from)? {
        Some(lock) => output::print(&LockView(lock), settings.format),
        None if settings.format == OutputFormat::Json => println!("null"),
        None => println!("No lock held"),
    }
    Ok(())
}

/// Release the lock without stopping the run that holds it
pub async fn unlock(client: &ApiClient) -> Result<()> {
    match client.unlock().await.map_err(RjError::from)? {
        Some(message) => println!("{}", message),
        None => println!("No lock held"),
    }
    Ok(())
}
