// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Remote Jobs daemon library
//!
//! Configuration, startup and the HTTP surface; the `rjd` binary wires them
//! to signals and logging.

pub mod api;
pub mod config;
pub mod lifecycle;

pub use api::{api_routes, AppState, Backends};
pub use config::{Config, ConfigError, Paths};
pub use lifecycle::{open_runtime, startup, DaemonRuntime, DaemonState, LifecycleError, Live};
