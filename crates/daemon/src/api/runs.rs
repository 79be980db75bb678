// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run submission, status, history and log streaming

use super::{ApiError, ApiResult, AppState, Backends};
use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use rj_core::{Level, LogFilter, RunId, RunOptions, RunRecord, WorkloadInvocation};
use rj_engine::{RunSummary, Submitted};
use rj_storage::LogError;
use serde::{Deserialize, Serialize};

/// Page size when the caller gives none
const DEFAULT_HISTORY_LIMIT: u32 = 20;
const MAX_HISTORY_LIMIT: u32 = 1000;

/// 200 body for an immediate run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunAccepted {
    pub run_id: String,
}

/// 201 body for a scheduled run
#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleAccepted {
    pub schedule_id: String,
}

/// The three parts of a submission
struct Upload {
    invocation: WorkloadInvocation,
    options: RunOptions,
    archive: Vec<u8>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut invocation = None;
        let mut options = None;
        let mut archive = None;
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "invocation" => {
                    let bytes = field.bytes().await?;
                    invocation = Some(serde_json::from_slice(&bytes).map_err(|source| {
                        ApiError::InvalidField {
                            field: "invocation",
                            source,
                        }
                    })?);
                }
                "options" => {
                    let bytes = field.bytes().await?;
                    options = Some(serde_json::from_slice(&bytes).map_err(|source| {
                        ApiError::InvalidField {
                            field: "options",
                            source,
                        }
                    })?);
                }
                "archive" => archive = Some(field.bytes().await?.to_vec()),
                other => tracing::debug!(field = other, "ignoring multipart field"),
            }
        }
        Ok(Self {
            invocation: invocation.ok_or(ApiError::MissingField("invocation"))?,
            options: options.ok_or(ApiError::MissingField("options"))?,
            archive: archive.ok_or(ApiError::MissingField("archive"))?,
        })
    }
}

/// POST /api/run
async fn submit<B: Backends>(
    State(state): State<AppState<B>>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let upload = Upload::read(multipart).await?;
    let submitted = state
        .runtime
        .submit(upload.invocation, upload.options, upload.archive)
        .await?;
    Ok(match submitted {
        Submitted::Run(run_id) => (
            StatusCode::OK,
            Json(RunAccepted {
                run_id: run_id.to_string(),
            }),
        )
            .into_response(),
        Submitted::Schedule(schedule_id) => (
            StatusCode::CREATED,
            Json(ScheduleAccepted {
                schedule_id: schedule_id.to_string(),
            }),
        )
            .into_response(),
    })
}

/// GET /api/run/{run_id}
async fn status<B: Backends>(
    State(state): State<AppState<B>>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunSummary>> {
    Ok(Json(state.runtime.status(&RunId::new(run_id)).await?))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    skip: u32,
    limit: Option<u32>,
    project: Option<String>,
}

/// GET /api/runs
async fn history<B: Backends>(
    State(state): State<AppState<B>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<RunRecord>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let runs = state
        .runtime
        .history(query.skip, limit, query.project.as_deref())
        .await?;
    Ok(Json(runs))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    /// Lowest level to include
    level: Option<String>,
}

/// GET /api/logs/{run_id}
///
/// One JSON event per line, ending after the sentinel.
async fn logs<B: Backends>(
    State(state): State<AppState<B>>,
    Path(run_id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Response> {
    let filter = match query.level.as_deref() {
        Some(level) => LogFilter::new(level.parse::<Level>().map_err(ApiError::InvalidQuery)?),
        None => LogFilter::default(),
    };
    let tail = state.runtime.tail(&RunId::new(run_id), filter).await?;
    let lines = tail.into_stream().map(|event| {
        event.and_then(|event| {
            let mut line = event.to_line().map_err(LogError::from)?;
            line.push('\n');
            Ok(line)
        })
    });
    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response())
}

pub(super) fn router<B: Backends>() -> Router<AppState<B>> {
    Router::new()
        .route("/run", post(submit::<B>))
        .route("/run/{run_id}", get(status::<B>))
        .route("/runs", get(history::<B>))
        .route("/logs/{run_id}", get(logs::<B>))
}
