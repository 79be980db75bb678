// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock inspection and administrative unlock

use super::{ApiError, ApiResult, AppState, Backends, MessageResponse};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use rj_core::LockRecord;

/// POST /api/unlock
///
/// Frees the lock without stopping a job that may still be running.
async fn unlock<B: Backends>(State(state): State<AppState<B>>) -> ApiResult<Json<MessageResponse>> {
    let holder = state.runtime.lock_info().await?;
    if !state.runtime.unlock().await? {
        return Err(ApiError::NoLock);
    }
    match holder {
        Some(record) => {
            tracing::warn!(holder = %record.holder, run_id = %record.run_id, "lock released by admin");
            Ok(Json(MessageResponse::new(format!(
                "Released lock held by {} for run {}",
                record.holder, record.run_id
            ))))
        }
        None => Ok(Json(MessageResponse::new("Lock released"))),
    }
}

/// GET /api/lock
async fn lock_info<B: Backends>(State(state): State<AppState<B>>) -> ApiResult<Json<LockRecord>> {
    state
        .runtime
        .lock_info()
        .await?
        .map(Json)
        .ok_or(ApiError::NoLock)
}

pub(super) fn router<B: Backends>() -> Router<AppState<B>> {
    Router::new()
        .route("/unlock", post(unlock::<B>))
        .route("/lock", get(lock_info::<B>))
}
