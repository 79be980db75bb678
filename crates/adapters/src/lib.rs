// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the workload process, batch-job backends and
//! cron-trigger backends

pub mod dispatch;
pub mod schedule;
pub mod traced;
pub mod workload;

pub use dispatch::{
    BatchDispatcher, ContainerInstanceDispatcher, DispatchError, DispatchRequest, Dispatcher,
    JobHandle, LocalProcessDispatcher, ServerlessJobDispatcher, MAX_RETRIES,
};
pub use schedule::{
    CloudScheduler, CronScheduler, NoOpScheduler, ScheduleEntry, ScheduleError, Scheduler,
};
pub use traced::{TracedDispatcher, TracedScheduler, TracedWorkload};
pub use workload::{
    ProcessWorkload, Workload, WorkloadContext, WorkloadError, WorkloadEvent, WorkloadOutcome,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use dispatch::{DispatchCall, FakeDispatcher};
#[cfg(any(test, feature = "test-support"))]
pub use schedule::{FakeScheduler, ScheduleCall};
#[cfg(any(test, feature = "test-support"))]
pub use workload::{FakeWorkload, WorkloadCall};
