// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rj logs <run-id>` - stream a run's events until it completes

use anyhow::Result;
use clap::Args;
use rj_core::{Level, LogEvent};
use std::sync::Arc;
use tokio::sync::Notify;

use super::Settings;
use crate::client::ApiClient;
use crate::error::RjError;
use crate::output::OutputFormat;

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Run to follow
    pub run_id: String,

    /// Lowest level to show (debug, info, warn, error)
    #[arg(long, value_parser = parse_level)]
    pub level: Option<Level>,
}

pub fn parse_level(s: &str) -> Result<Level, String> {
    s.parse()
}

/// How a follow ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Follow {
    /// The stream delivered the completion event
    Completed,
    /// The server closed the stream early
    Closed,
    /// Ctrl-C; the run keeps going on the server
    Detached,
}

pub async fn handle(client: &ApiClient, args: LogsArgs, settings: &Settings) -> Result<()> {
    if follow(client, &args.run_id, args.level, settings.format).await? == Follow::Detached {
        eprintln!("Detached; run {} continues on the server", args.run_id);
    }
    Ok(())
}

/// Print events of `run_id` until the stream ends or the user detaches
pub async fn follow(
    client: &ApiClient,
    run_id: &str,
    level: Option<Level>,
    format: OutputFormat,
) -> Result<Follow> {
    let mut stream = client.logs(run_id, level).await.map_err(RjError::from)?;

    let interrupted = Arc::new(Notify::new());
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.notify_one())?;
    }

    loop {
        let event = tokio::select! {
            event = stream.next() => event,
            _ = interrupted.notified() => return Ok(Follow::Detached),
        };
        match event {
            Some(event) => {
                let event = event.map_err(RjError::from)?;
                print_event(&event, format)?;
                if event.is_sentinel() {
                    return Ok(Follow::Completed);
                }
            }
            None => return Ok(Follow::Closed),
        }
    }
}

fn print_event(event: &LogEvent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", event),
        OutputFormat::Json => println!("{}", event.to_line()?),
    }
    Ok(())
}
