// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rj_core::{Level, RunId, WorkloadInvocation};
use std::time::Duration;

fn ctx(input: &std::path::Path) -> WorkloadContext {
    WorkloadContext {
        run_id: RunId::new("r1"),
        program: "dbt".to_string(),
        invocation: WorkloadInvocation::new("build"),
        input_dir: input.to_path_buf(),
        output_dir: input.join("out"),
        env: Vec::new(),
    }
}

#[tokio::test]
async fn emits_scripted_events_and_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeWorkload::new()
        .with_events(vec![WorkloadEvent::new(Level::Info, "a", "one")])
        .with_output("target/run_results.json", "{}");

    let (tx, mut rx) = mpsc::channel(8);
    let outcome = fake.invoke(&ctx(dir.path()), tx).await.unwrap();

    assert!(outcome.success);
    assert_eq!(rx.recv().await.unwrap().message, "one");
    assert!(dir.path().join("target/run_results.json").is_file());
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn gated_workload_waits_for_release() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeWorkload::gated().failing(Some(2));
    let ctx = ctx(dir.path());

    let task = {
        let fake = fake.clone();
        tokio::spawn(async move {
            let (tx, _rx) = mpsc::channel(8);
            fake.invoke(&ctx, tx).await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!task.is_finished());

    fake.release();
    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome, WorkloadOutcome::failed(Some(2)));
}

#[tokio::test]
async fn erroring_workload_does_not_start() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeWorkload::new().erroring("no binary");
    let (tx, _rx) = mpsc::channel(8);
    let err = fake.invoke(&ctx(dir.path()), tx).await.unwrap_err();
    assert!(err.to_string().contains("no binary"));
}
