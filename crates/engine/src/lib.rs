// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Remote Jobs execution engine
//!
//! The exclusivity lock, the job executor, the run log channel and the
//! runtime that submits, dispatches and triggers runs.

mod error;
mod executor;
mod lock;
mod log_channel;
mod runtime;
pub mod schedules;

pub use error::RuntimeError;
pub use executor::{ExecuteError, Executor, ExecutorConfig};
pub use lock::{LockError, LockService};
pub use log_channel::{LogChannel, LogTail, LogWriter, DEFAULT_POLL_INTERVAL};
pub use runtime::{RunSummary, Runtime, RuntimeConfig, RuntimeDeps, Submitted};
