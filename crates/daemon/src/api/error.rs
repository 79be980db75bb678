// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API errors and their HTTP mapping

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rj_core::LockRecord;
use rj_engine::{LockError, RuntimeError};
use rj_storage::{ArtifactError, RegistryError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Current holder, on 423
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_info: Option<LockRecord>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            lock_info: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Invalid {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("Missing multipart field: {0}")]
    MissingField(&'static str),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("No lock held")]
    NoLock,

    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status_and_body(&self) -> (StatusCode, ErrorResponse) {
        let detailed = |status: StatusCode, error: &str| {
            (status, ErrorResponse::with_details(error, self.to_string()))
        };
        match self {
            ApiError::Runtime(RuntimeError::Lock(LockError::Conflict(record))) => (
                StatusCode::LOCKED,
                ErrorResponse {
                    error: format!(
                        "Run {} by {} is in progress since {}",
                        record.run_id,
                        record.holder,
                        record.created_at.to_rfc3339()
                    ),
                    details: None,
                    lock_info: Some(record.clone()),
                },
            ),
            ApiError::Runtime(RuntimeError::Dispatch(_)) => {
                detailed(StatusCode::BAD_REQUEST, "Job dispatch failed")
            }
            ApiError::Runtime(RuntimeError::RunNotFound(_))
            | ApiError::Runtime(RuntimeError::Registry(
                RegistryError::RunNotFound(_)
                | RegistryError::ConfigurationNotFound(_)
                | RegistryError::NotASchedule(_),
            )) => detailed(StatusCode::NOT_FOUND, "Not found"),
            ApiError::Runtime(RuntimeError::Artifact(
                ArtifactError::DigestMismatch { .. }
                | ArtifactError::Zip(_)
                | ArtifactError::UnsafeEntry(_)
                | ArtifactError::TooLarge { .. },
            )) => detailed(StatusCode::BAD_REQUEST, "Invalid artifact archive"),
            ApiError::Runtime(RuntimeError::Cron(_)) => {
                detailed(StatusCode::BAD_REQUEST, "Invalid cron schedule")
            }
            ApiError::Runtime(e) => {
                tracing::error!(error = %e, "request failed");
                detailed(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            ApiError::Multipart(_)
            | ApiError::InvalidField { .. }
            | ApiError::MissingField(_)
            | ApiError::InvalidQuery(_) => detailed(StatusCode::BAD_REQUEST, "Bad request"),
            ApiError::NoLock => (StatusCode::NOT_FOUND, ErrorResponse::new("No lock held")),
            ApiError::ScheduleNotFound(_) => detailed(StatusCode::NOT_FOUND, "Schedule not found"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_client_error() {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
