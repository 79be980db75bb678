// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule listing, removal and the trigger target

use super::{ApiError, ApiResult, AppState, Backends, MessageResponse, RunAccepted};
use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rj_adapters::ScheduleEntry;
use rj_core::RunId;

/// GET /api/schedules
async fn list<B: Backends>(
    State(state): State<AppState<B>>,
) -> ApiResult<Json<Vec<ScheduleEntry>>> {
    Ok(Json(state.runtime.schedules().await?))
}

/// DELETE /api/schedules/{name}
async fn remove<B: Backends>(
    State(state): State<AppState<B>>,
    Path(name): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    if state.runtime.delete_schedule(&name).await? {
        Ok(Json(MessageResponse::new(format!("Deleted schedule {}", name))))
    } else {
        Err(ApiError::ScheduleNotFound(name))
    }
}

/// POST /api/schedules/{schedule_id}/trigger
///
/// Called by the cron backend; starts a fresh run from the stored template.
async fn trigger<B: Backends>(
    State(state): State<AppState<B>>,
    Path(schedule_id): Path<String>,
) -> ApiResult<Json<RunAccepted>> {
    let run_id = state.runtime.trigger(&RunId::new(schedule_id)).await?;
    Ok(Json(RunAccepted {
        run_id: run_id.to_string(),
    }))
}

pub(super) fn router<B: Backends>() -> Router<AppState<B>> {
    Router::new()
        .route("/schedules", get(list::<B>))
        // One parameter name for both: the router rejects differing names at a segment
        .route("/schedules/{schedule}", delete(remove::<B>))
        .route("/schedules/{schedule}/trigger", post(trigger::<B>))
}
