// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rj_core::{RunId, WorkloadInvocation};
use std::time::Duration;

fn request() -> DispatchRequest {
    DispatchRequest::new(RunId::new("r1"), WorkloadInvocation::new("run"), "/state/runs/r1")
}

#[tokio::test]
async fn create_rejects_missing_program() {
    let dispatcher = LocalProcessDispatcher::new("/no/such/rjd");
    assert!(matches!(
        dispatcher.create(&request()).await,
        Err(DispatchError::CreateFailed(_))
    ));
}

#[tokio::test]
async fn launch_spawns_job_entry() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("args");
    let script = dir.path().join("fake-rjd");
    std::fs::write(
        &script,
        format!("#!/bin/sh\necho \"$@\" > {}\n", marker.display()),
    )
    .unwrap();
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let dispatcher = LocalProcessDispatcher::new(&script)
        .with_args(vec!["--state-dir".to_string(), "/state".to_string()]);
    let handle = dispatcher.create(&request()).await.unwrap();
    assert!(!handle.started);
    dispatcher.launch(&handle).await.unwrap();

    let mut contents = String::new();
    for _ in 0..100 {
        if let Ok(c) = std::fs::read_to_string(&marker) {
            if !c.is_empty() {
                contents = c;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(contents.trim(), "--state-dir /state job --run-id r1");
}

#[tokio::test]
async fn launch_of_unknown_program_fails() {
    let dispatcher = LocalProcessDispatcher::new("rjd-does-not-exist-anywhere");
    let handle = dispatcher.create(&request()).await.unwrap();
    assert!(matches!(
        dispatcher.launch(&handle).await,
        Err(DispatchError::LaunchFailed(_))
    ));
}
