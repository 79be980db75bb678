// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch dispatch adapters
//!
//! Launch a run's workload outside the server process. Every backend splits
//! the work into `create` (build the job unit) and `launch` (start it). For
//! backends where creation already starts the job, `launch` does nothing.

mod container;
mod local;
mod serverless;

pub use container::ContainerInstanceDispatcher;
pub use local::LocalProcessDispatcher;
pub use serverless::ServerlessJobDispatcher;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DispatchCall, FakeDispatcher};

use async_trait::async_trait;
use rj_core::{RunId, WorkloadInvocation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Platform retry budget for a dispatched job. Retrying is the client's call.
pub const MAX_RETRIES: u32 = 0;

/// Errors from dispatch operations. Neither kind is retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch create failed: {0}")]
    CreateFailed(String),
    #[error("dispatch launch failed: {0}")]
    LaunchFailed(String),
}

/// What a backend needs to build a job unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub run_id: RunId,
    pub invocation: WorkloadInvocation,
    /// Location of the run's artifact namespace as the job will see it
    pub artifact_uri: String,
    #[serde(default)]
    pub provider_config: BTreeMap<String, String>,
    pub max_retries: u32,
}

impl DispatchRequest {
    pub fn new(
        run_id: RunId,
        invocation: WorkloadInvocation,
        artifact_uri: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            invocation,
            artifact_uri: artifact_uri.into(),
            provider_config: BTreeMap::new(),
            max_retries: MAX_RETRIES,
        }
    }

    /// Job unit name derived from the run id
    pub fn job_name(&self) -> String {
        format!("rj-{}", self.run_id.as_str().to_ascii_lowercase())
    }

    /// Command line the job runs: the daemon's dispatched-execution entry
    pub fn job_command(&self) -> Vec<String> {
        vec![
            "rjd".to_string(),
            "job".to_string(),
            "--run-id".to_string(),
            self.run_id.to_string(),
        ]
    }
}

/// Handle to a created job unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub backend: String,
    pub job_id: String,
    pub run_id: RunId,
    /// Creation already started the job
    pub started: bool,
}

/// Adapter for launching jobs on an execution backend
#[async_trait]
pub trait BatchDispatcher: Clone + Send + Sync + 'static {
    /// Backend name for logs and handles
    fn backend(&self) -> &'static str;

    /// Build the job unit
    async fn create(&self, request: &DispatchRequest) -> Result<JobHandle, DispatchError>;

    /// Start a created job unit
    async fn launch(&self, handle: &JobHandle) -> Result<(), DispatchError>;
}

/// Backend chosen at startup from configuration
#[derive(Clone, Debug)]
pub enum Dispatcher {
    ServerlessJob(ServerlessJobDispatcher),
    ContainerInstance(ContainerInstanceDispatcher),
    LocalProcess(LocalProcessDispatcher),
}

#[async_trait]
impl BatchDispatcher for Dispatcher {
    fn backend(&self) -> &'static str {
        match self {
            Dispatcher::ServerlessJob(d) => d.backend(),
            Dispatcher::ContainerInstance(d) => d.backend(),
            Dispatcher::LocalProcess(d) => d.backend(),
        }
    }

    async fn create(&self, request: &DispatchRequest) -> Result<JobHandle, DispatchError> {
        match self {
            Dispatcher::ServerlessJob(d) => d.create(request).await,
            Dispatcher::ContainerInstance(d) => d.create(request).await,
            Dispatcher::LocalProcess(d) => d.create(request).await,
        }
    }

    async fn launch(&self, handle: &JobHandle) -> Result<(), DispatchError> {
        match self {
            Dispatcher::ServerlessJob(d) => d.launch(handle).await,
            Dispatcher::ContainerInstance(d) => d.launch(handle).await,
            Dispatcher::LocalProcess(d) => d.launch(handle).await,
        }
    }
}

/// Shared HTTP plumbing for the remote backends
pub(crate) mod http {
    use reqwest::{RequestBuilder, Response};

    pub fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-2xx response into a message
    pub async fn check(response: Response) -> Result<Response, String> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(format!("{}: {}", status, body.trim()))
    }
}
