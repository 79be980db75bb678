// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the rjd API

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use rj_core::{
    Level, LockRecord, LogEvent, RunConfiguration, RunId, RunOptions, RunRecord,
    WorkloadInvocation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timeout for establishing a connection to the server
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Cannot reach rjd at {url}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned {status}: {}", .body.error)]
    Api { status: StatusCode, body: ErrorBody },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Error body returned by the server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub lock_info: Option<LockRecord>,
}

/// What the server made of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Accepted for immediate execution
    Run(RunId),
    /// Stored as a recurring template
    Schedule(RunId),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Accepted {
    Run { run_id: RunId },
    Schedule { schedule_id: RunId },
}

/// `GET /api/run/{id}` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDetail {
    #[serde(flatten)]
    pub record: RunRecord,
    #[serde(default)]
    pub configuration: Option<RunConfiguration>,
}

/// One registered schedule trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub name: String,
    pub cron_expression: String,
    pub trigger_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// `GET /api/check` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCheck {
    pub status: String,
    pub backend: String,
    pub uptime_secs: u64,
}

#[derive(Deserialize)]
struct Message {
    message: String,
}

/// Client for one rjd server
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Send a request; non-2xx responses become [`ClientError::Api`]
    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ClientError::Unreachable {
                    url: self.base_url.clone(),
                    source: e,
                }
            } else {
                ClientError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.json::<ErrorBody>().await {
            Ok(body) => body,
            Err(_) => ErrorBody {
                error: status.canonical_reason().unwrap_or("Error").to_string(),
                details: None,
                lock_info: None,
            },
        };
        tracing::debug!(status = %status, error = %body.error, "request rejected");
        Err(ClientError::Api { status, body })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.send(self.http.get(self.url(path))).await?;
        Ok(response.json().await?)
    }

    pub async fn check(&self) -> Result<ServerCheck, ClientError> {
        self.get_json("/check").await
    }

    /// Upload an invocation with its options and artifact archive
    pub async fn submit(
        &self,
        invocation: &WorkloadInvocation,
        options: &RunOptions,
        archive: Vec<u8>,
    ) -> Result<Submission, ClientError> {
        let archive = Part::bytes(archive)
            .file_name("artifacts.zip")
            .mime_str("application/zip")?;
        let form = Form::new()
            .text("invocation", serde_json::to_string(invocation)?)
            .text("options", serde_json::to_string(options)?)
            .part("archive", archive);

        let response = self
            .send(self.http.post(self.url("/run")).multipart(form))
            .await?;
        Ok(match response.json::<Accepted>().await? {
            Accepted::Run { run_id } => Submission::Run(run_id),
            Accepted::Schedule { schedule_id } => Submission::Schedule(schedule_id),
        })
    }

    pub async fn status(&self, run_id: &str) -> Result<RunDetail, ClientError> {
        self.get_json(&format!("/run/{}", run_id)).await
    }

    pub async fn history(
        &self,
        skip: u32,
        limit: u32,
        project: Option<&str>,
    ) -> Result<Vec<RunRecord>, ClientError> {
        let mut query = vec![("skip", skip.to_string()), ("limit", limit.to_string())];
        if let Some(project) = project {
            query.push(("project", project.to_string()));
        }
        let request = self.http.get(self.url("/runs")).query(&query);
        Ok(self.send(request).await?.json().await?)
    }

    /// Open the event stream of a run
    pub async fn logs(&self, run_id: &str, level: Option<Level>) -> Result<LogStream, ClientError> {
        let mut request = self.http.get(self.url(&format!("/logs/{}", run_id)));
        if let Some(level) = level {
            request = request.query(&[("level", level.as_str())]);
        }
        let response = self.send(request).await?;
        Ok(LogStream::new(response))
    }

    /// Release the lock; `None` when nothing held it
    pub async fn unlock(&self) -> Result<Option<String>, ClientError> {
        match self.send(self.http.post(self.url("/unlock"))).await {
            Ok(response) => Ok(Some(response.json::<Message>().await?.message)),
            Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn lock(&self) -> Result<Option<LockRecord>, ClientError> {
        match self.get_json("/lock").await {
            Ok(record) => Ok(Some(record)),
            Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn schedules(&self) -> Result<Vec<ScheduleEntry>, ClientError> {
        self.get_json("/schedules").await
    }

    pub async fn delete_schedule(&self, name: &str) -> Result<String, ClientError> {
        let request = self.http.delete(self.url(&format!("/schedules/{}", name)));
        Ok(self.send(request).await?.json::<Message>().await?.message)
    }
}

/// Splits a byte stream into lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Add a chunk, returning every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line[..end]);
            let text = text.trim_end_matches('\r');
            if !text.trim().is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// The unterminated remainder once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Decoded events of one `/api/logs` response
pub struct LogStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: LineBuffer,
    ready: VecDeque<String>,
    ended: bool,
}

impl LogStream {
    fn new(response: Response) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Self {
            body,
            buffer: LineBuffer::default(),
            ready: VecDeque::new(),
            ended: false,
        }
    }

    /// Next event, or `None` once the server closes the stream
    pub async fn next(&mut self) -> Option<Result<LogEvent, ClientError>> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(LogEvent::from_line(&line).map_err(ClientError::from));
            }
            if self.ended {
                return None;
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.buffer.push(&chunk)),
                Some(Err(e)) => return Some(Err(e.into())),
                None => {
                    self.ended = true;
                    self.ready.extend(self.buffer.finish());
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
