// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::dispatch::FakeDispatcher;
use crate::schedule::FakeScheduler;
use crate::workload::FakeWorkload;
use rj_core::{Level, RunId, WorkloadInvocation};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::new();
    let logs_clone = logs.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs_clone)
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

fn workload_ctx() -> WorkloadContext {
    WorkloadContext {
        run_id: RunId::new("run-7"),
        program: "dbt".to_string(),
        invocation: WorkloadInvocation::new("build"),
        input_dir: std::env::temp_dir(),
        output_dir: std::env::temp_dir(),
        env: Vec::new(),
    }
}

#[test]
fn traced_workload_logs_span_and_outcome() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeWorkload::new()
            .with_events(vec![WorkloadEvent::new(Level::Info, "x", "y")])
            .failing(Some(1));
        let traced = TracedWorkload::new(fake);
        let (tx, _rx) = mpsc::channel(8);
        traced.invoke(&workload_ctx(), tx).await
    });

    assert!(!result.unwrap().success);
    assert!(logs.contains("workload.invoke"), "Logs:\n{}", logs);
    assert!(logs.contains("run-7"), "Logs:\n{}", logs);
    assert!(logs.contains("starting"), "Logs:\n{}", logs);
    assert!(logs.contains("workload finished"), "Logs:\n{}", logs);
    assert!(logs.contains("elapsed_ms"), "Logs:\n{}", logs);
}

#[test]
fn traced_workload_logs_spawn_error() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedWorkload::new(FakeWorkload::new().erroring("missing dbt"));
        let (tx, _rx) = mpsc::channel(8);
        traced.invoke(&workload_ctx(), tx).await
    });

    assert!(result.is_err());
    assert!(logs.contains("workload could not run"), "Logs:\n{}", logs);
    assert!(logs.contains("missing dbt"), "Logs:\n{}", logs);
}

#[test]
fn traced_dispatcher_logs_create_and_launch() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedDispatcher::new(FakeDispatcher::new());
        let request =
            DispatchRequest::new(RunId::new("run-9"), WorkloadInvocation::new("run"), "/ns");
        let handle = traced.create(&request).await?;
        traced.launch(&handle).await
    });

    assert!(result.is_ok());
    assert!(logs.contains("dispatch.create"), "Logs:\n{}", logs);
    assert!(logs.contains("job created"), "Logs:\n{}", logs);
    assert!(logs.contains("dispatch.launch"), "Logs:\n{}", logs);
    assert!(logs.contains("job launched"), "Logs:\n{}", logs);
    assert!(logs.contains("backend=\"fake\"") || logs.contains("backend=fake"), "Logs:\n{}", logs);
}

#[test]
fn traced_dispatcher_logs_launch_failure() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeDispatcher::new();
        fake.fail_launch("quota exceeded");
        let traced = TracedDispatcher::new(fake);
        let request =
            DispatchRequest::new(RunId::new("run-9"), WorkloadInvocation::new("run"), "/ns");
        let handle = traced.create(&request).await?;
        traced.launch(&handle).await
    });

    assert!(matches!(result, Err(DispatchError::LaunchFailed(_))));
    assert!(logs.contains("launch failed"), "Logs:\n{}", logs);
    assert!(logs.contains("quota exceeded"), "Logs:\n{}", logs);
}

#[test]
fn traced_scheduler_logs_save_and_delete() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedScheduler::new(FakeScheduler::new());
        traced
            .create_or_update("nightly", "0 2 * * *", "http://rj/t", None)
            .await?;
        traced.delete("nightly").await
    });

    assert!(result.unwrap());
    assert!(logs.contains("scheduler.create_or_update"), "Logs:\n{}", logs);
    assert!(logs.contains("schedule saved"), "Logs:\n{}", logs);
    assert!(logs.contains("existed=true"), "Logs:\n{}", logs);
}
