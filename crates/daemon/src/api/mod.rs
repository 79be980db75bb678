// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface of the daemon
//!
//! Routes:
//! - POST   /api/run                            - submit a run or schedule (multipart)
//! - GET    /api/run/{run_id}                   - run status with its configuration
//! - GET    /api/runs                           - run history
//! - GET    /api/logs/{run_id}                  - line-delimited event stream
//! - POST   /api/unlock                         - administrative unlock
//! - GET    /api/lock                           - current lock holder
//! - GET    /api/schedules                      - registered triggers
//! - DELETE /api/schedules/{name}               - remove a trigger
//! - POST   /api/schedules/{schedule_id}/trigger - materialize a run from a schedule
//! - GET    /api/check, /api/version            - liveness and version

pub mod error;
mod health;
mod lock;
mod runs;
mod schedules;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use health::{CheckResponse, VersionResponse};
pub use runs::{RunAccepted, ScheduleAccepted};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use rj_adapters::{BatchDispatcher, CronScheduler, Workload};
use rj_core::{Clock, IdGen};
use rj_engine::Runtime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Largest accepted upload, archive included
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// The adapter types one daemon runs with
pub trait Backends: Send + Sync + 'static {
    type Workload: Workload;
    type Dispatcher: BatchDispatcher;
    type Scheduler: CronScheduler;
    type Clock: Clock;
    type Ids: IdGen;
}

pub type BackendRuntime<B> = Runtime<
    <B as Backends>::Workload,
    <B as Backends>::Dispatcher,
    <B as Backends>::Scheduler,
    <B as Backends>::Clock,
    <B as Backends>::Ids,
>;

/// State shared by every handler
pub struct AppState<B: Backends> {
    pub runtime: Arc<BackendRuntime<B>>,
    pub start_time: Instant,
}

impl<B: Backends> AppState<B> {
    pub fn new(runtime: BackendRuntime<B>) -> Self {
        Self {
            runtime: Arc::new(runtime),
            start_time: Instant::now(),
        }
    }
}

impl<B: Backends> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            runtime: Arc::clone(&self.runtime),
            start_time: self.start_time,
        }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Build the `/api` router
pub fn api_routes<B: Backends>(state: AppState<B>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", runs::router())
        .nest("/api", lock::router())
        .nest("/api", schedules::router())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
