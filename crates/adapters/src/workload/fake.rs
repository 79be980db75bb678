// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake workload for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Workload, WorkloadContext, WorkloadError, WorkloadEvent, WorkloadOutcome};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// Recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadCall {
    pub ctx: WorkloadContext,
}

#[derive(Debug, Clone)]
enum Script {
    Succeed,
    Fail(Option<i32>),
    Error(String),
}

/// Scripted workload
///
/// Emits the configured events, optionally waits for [`FakeWorkload::release`],
/// writes the configured output files, then finishes as scripted.
#[derive(Clone)]
pub struct FakeWorkload {
    events: Arc<Mutex<Vec<WorkloadEvent>>>,
    outputs: Arc<Mutex<Vec<(PathBuf, String)>>>,
    script: Arc<Mutex<Script>>,
    gate: Option<Arc<Notify>>,
    calls: Arc<Mutex<Vec<WorkloadCall>>>,
}

impl Default for FakeWorkload {
    fn default() -> Self {
        Self {
            events: Arc::default(),
            outputs: Arc::default(),
            script: Arc::new(Mutex::new(Script::Succeed)),
            gate: None,
            calls: Arc::default(),
        }
    }
}

impl FakeWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block every invocation until [`release`](Self::release) is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::default()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn with_events(self, events: Vec<WorkloadEvent>) -> Self {
        *self.events.lock().unwrap_or_else(|e| e.into_inner()) = events;
        self
    }

    /// File written relative to the input dir before finishing
    pub fn with_output(self, relative: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((relative.into(), contents.into()));
        self
    }

    pub fn failing(self, exit_code: Option<i32>) -> Self {
        *self.script.lock().unwrap_or_else(|e| e.into_inner()) = Script::Fail(exit_code);
        self
    }

    /// Fail to start at all
    pub fn erroring(self, message: impl Into<String>) -> Self {
        *self.script.lock().unwrap_or_else(|e| e.into_inner()) = Script::Error(message.into());
        self
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<WorkloadCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Workload for FakeWorkload {
    async fn invoke(
        &self,
        ctx: &WorkloadContext,
        events: mpsc::Sender<WorkloadEvent>,
    ) -> Result<WorkloadOutcome, WorkloadError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(WorkloadCall { ctx: ctx.clone() });

        let script = self.script.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Script::Error(message) = &script {
            return Err(WorkloadError::SpawnFailed(message.clone()));
        }

        let scripted = self.events.lock().unwrap_or_else(|e| e.into_inner()).clone();
        for event in scripted {
            let _ = events.send(event).await;
        }

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let outputs = self.outputs.lock().unwrap_or_else(|e| e.into_inner()).clone();
        for (relative, contents) in outputs {
            let path = ctx.input_dir.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
        }

        Ok(match script {
            Script::Fail(code) => WorkloadOutcome::failed(code),
            _ => WorkloadOutcome::succeeded(),
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
