// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness and version endpoints

use super::{AppState, Backends};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub status: String,
    /// Where runs execute
    pub backend: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

async fn check<B: Backends>(State(state): State<AppState<B>>) -> Json<CheckResponse> {
    Json(CheckResponse {
        status: "ok".to_string(),
        backend: state.runtime.backend().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub(super) fn router<B: Backends>() -> Router<AppState<B>> {
    Router::new()
        .route("/check", get(check::<B>))
        .route("/version", get(version))
}
