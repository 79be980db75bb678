// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod artifacts;
pub mod history;
pub mod lock;
pub mod logs;
pub mod run;
pub mod schedules;
pub mod status;

use crate::output::OutputFormat;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    /// Identity recorded as the requester and lock holder
    pub user: String,
    pub format: OutputFormat,
}
