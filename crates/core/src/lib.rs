// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rj-core: Core library for Remote Jobs (rj)
//!
//! This crate provides:
//! - The run data model (configurations, records, lock records, log events)
//! - The run-status state machine
//! - Clock and id-generation abstractions for testable time and identity
//! - Cron trigger validation

pub mod clock;
pub mod id;

pub mod cron;
pub mod invocation;
pub mod lock;
pub mod log;
pub mod run;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use cron::{CronError, CronExpr, Trigger, RUN_NOW};
pub use id::{IdGen, RunId, SequentialIdGen, UlidIdGen, SCHEDULE_PREFIX};
pub use invocation::WorkloadInvocation;
pub use lock::{LockConfig, LockRecord, DEFAULT_REFRESH_COOLDOWN};
pub use log::{Level, LogEvent, LogFilter};
pub use run::{RunConfiguration, RunOptions, RunRecord, RunStatus, TransitionError};
