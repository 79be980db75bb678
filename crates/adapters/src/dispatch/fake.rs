// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake dispatcher for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{BatchDispatcher, DispatchError, DispatchRequest, JobHandle};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Recorded dispatch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchCall {
    Create { request: DispatchRequest },
    Launch { handle: JobHandle },
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<DispatchCall>,
    fail_create: Option<String>,
    fail_launch: Option<String>,
    starts_on_create: bool,
}

/// Fake dispatcher that records calls and fails on request
#[derive(Clone, Default)]
pub struct FakeDispatcher {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like a backend whose create also starts the job
    pub fn starting_on_create(self) -> Self {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).starts_on_create = true;
        self
    }

    pub fn fail_create(&self, message: impl Into<String>) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).fail_create = Some(message.into());
    }

    pub fn fail_launch(&self, message: impl Into<String>) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).fail_launch = Some(message.into());
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<DispatchCall> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).calls.clone()
    }
}

#[async_trait]
impl BatchDispatcher for FakeDispatcher {
    fn backend(&self) -> &'static str {
        "fake"
    }

    async fn create(&self, request: &DispatchRequest) -> Result<JobHandle, DispatchError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(DispatchCall::Create {
            request: request.clone(),
        });
        if let Some(message) = &state.fail_create {
            return Err(DispatchError::CreateFailed(message.clone()));
        }
        Ok(JobHandle {
            backend: "fake".to_string(),
            job_id: format!("fake-{}", request.run_id),
            run_id: request.run_id.clone(),
            started: state.starts_on_create,
        })
    }

    async fn launch(&self, handle: &JobHandle) -> Result<(), DispatchError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(DispatchCall::Launch {
            handle: handle.clone(),
        });
        if let Some(message) = &state.fail_launch {
            return Err(DispatchError::LaunchFailed(message.clone()));
        }
        Ok(())
    }
}
