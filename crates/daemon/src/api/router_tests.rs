// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use rj_adapters::{FakeDispatcher, FakeScheduler, FakeWorkload};
use rj_core::{
    FakeClock, LogEvent, RunId, RunOptions, RunStatus, SequentialIdGen, WorkloadInvocation,
};
use rj_engine::{RuntimeConfig, RuntimeDeps};
use rj_storage::{digest, pack_to_vec, ArtifactStore, IgnoreSet, Registry};
use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

struct Fakes;

impl Backends for Fakes {
    type Workload = FakeWorkload;
    type Dispatcher = FakeDispatcher;
    type Scheduler = FakeScheduler;
    type Clock = FakeClock;
    type Ids = SequentialIdGen;
}

const BOUNDARY: &str = "rj-test-boundary";

struct Harness {
    _dir: TempDir,
    project: TempDir,
    state: AppState<Fakes>,
    app: Router,
    workload: FakeWorkload,
    dispatcher: FakeDispatcher,
    scheduler: FakeScheduler,
}

impl Harness {
    async fn new(workload: FakeWorkload) -> Self {
        Self::build(workload, false).await
    }

    async fn dispatched() -> Self {
        Self::build(FakeWorkload::new(), true).await
    }

    async fn build(workload: FakeWorkload, dispatched: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(project.path().join("dbt_project.yml"), "name: demo\n").unwrap();

        let dispatcher = FakeDispatcher::new();
        let scheduler = FakeScheduler::new();
        let runtime = rj_engine::Runtime::new(
            RuntimeDeps {
                registry: Registry::open_in_memory().await.unwrap(),
                artifacts: ArtifactStore::new(dir.path()),
                workload: workload.clone(),
                dispatcher: dispatched.then(|| dispatcher.clone()),
                scheduler: scheduler.clone(),
            },
            FakeClock::new(),
            SequentialIdGen::default(),
            RuntimeConfig {
                poll_interval: Duration::from_millis(10),
                server_url: Some("https://rj.example.com".to_string()),
                ..RuntimeConfig::default()
            },
        );
        let state = AppState::<Fakes>::new(runtime);
        let app = api_routes(state.clone());
        Self {
            _dir: dir,
            project,
            state,
            app,
            workload,
            dispatcher,
            scheduler,
        }
    }

    fn archive(&self) -> Vec<u8> {
        pack_to_vec(self.project.path(), &IgnoreSet::empty()).unwrap().0
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn json(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, body) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn submit_parts(&self, parts: &[(&str, Vec<u8>)]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/run")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn submit(&self, options: &RunOptions) -> (StatusCode, Value) {
        let invocation = WorkloadInvocation::new("build").with_flag("select", "orders");
        self.submit_parts(&[
            ("invocation", serde_json::to_vec(&invocation).unwrap()),
            ("options", serde_json::to_vec(options).unwrap()),
            ("archive", self.archive()),
        ])
        .await
    }

    async fn submit_run(&self, requester: &str) -> RunId {
        let (status, body) = self.submit(&RunOptions::new("warehouse", requester)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        RunId::new(body["run_id"].as_str().unwrap())
    }

    /// Stream the run's log over HTTP until the server closes it
    async fn stream_logs(&self, run: &RunId, query: &str) -> Vec<LogEvent> {
        let request = Request::builder()
            .uri(format!("/api/logs/{}{}", run, query))
            .body(Body::empty())
            .unwrap();
        let (status, body) = self.send(request).await;
        assert_eq!(status, StatusCode::OK);
        String::from_utf8(body)
            .unwrap()
            .lines()
            .map(|line| LogEvent::from_line(line).unwrap())
            .collect()
    }

    async fn run_status(&self, run: &RunId) -> String {
        let (status, body) = self.json(Method::GET, &format!("/api/run/{}", run)).await;
        assert_eq!(status, StatusCode::OK);
        body["run_status"].as_str().unwrap().to_string()
    }

    async fn wait_for_lock(&self) {
        for _ in 0..200 {
            if self.state.runtime.lock_info().await.unwrap().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("lock never taken");
    }
}

fn multipart_body(parts: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        if *name == "archive" {
            body.extend_from_slice(
                b"Content-Disposition: form-data; name=\"archive\"; filename=\"artifacts.zip\"\r\n\
                  Content-Type: application/zip\r\n\r\n",
            );
        } else {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            );
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[tokio::test]
async fn check_reports_backend_and_version_matches_crate() {
    let h = Harness::new(FakeWorkload::new()).await;

    let (status, body) = h.json(Method::GET, "/api/check").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "in_process");

    let (status, body) = h.json(Method::GET, "/api/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn immediate_run_streams_to_sentinel_and_succeeds() {
    let h = Harness::new(FakeWorkload::new()).await;
    let run = h.submit_run("alice").await;

    let events = h.stream_logs(&run, "").await;
    assert_eq!(events.first().unwrap().name, "run_started");
    assert!(events.last().unwrap().is_sentinel());
    assert_eq!(events.iter().filter(|e| e.is_sentinel()).count(), 1);
    assert_eq!(h.run_status(&run).await, "SUCCESS");

    let (_, body) = h.json(Method::GET, &format!("/api/run/{}", run)).await;
    assert_eq!(body["configuration"]["requester"], "alice");
    assert_eq!(body["configuration"]["invocation"]["command"], "build");
    assert_eq!(h.workload.calls().len(), 1);
}

#[tokio::test]
async fn second_submission_gets_423_with_holder() {
    let h = Harness::new(FakeWorkload::gated()).await;
    let first = h.submit_run("alice").await;
    h.wait_for_lock().await;

    let (status, body) = h.submit(&RunOptions::new("warehouse", "bob")).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["lock_info"]["holder"], "alice");
    assert_eq!(body["lock_info"]["run_id"], first.as_str());

    h.workload.release();
    let events = h.stream_logs(&first, "").await;
    assert!(events.last().unwrap().is_sentinel());
}

#[tokio::test]
async fn failed_run_releases_lock_without_unlock() {
    let h = Harness::new(FakeWorkload::new().failing(Some(2))).await;
    let run = h.submit_run("alice").await;

    let events = h.stream_logs(&run, "").await;
    assert!(events.last().unwrap().is_sentinel());
    assert_eq!(h.run_status(&run).await, "FAILED");

    let (status, _) = h.json(Method::GET, "/api/lock").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h.json(Method::POST, "/api/unlock").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unlock_frees_a_held_lock() {
    let h = Harness::new(FakeWorkload::gated()).await;
    let run = h.submit_run("alice").await;
    h.wait_for_lock().await;

    let (status, body) = h.json(Method::GET, "/api/lock").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run_id"], run.as_str());

    let (status, body) = h.json(Method::POST, "/api/unlock").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("alice"));

    let (status, _) = h.json(Method::POST, "/api/unlock").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    h.workload.release();
    h.stream_logs(&run, "").await;
}

#[tokio::test]
async fn schedule_submission_registers_and_triggers() {
    let h = Harness::new(FakeWorkload::new()).await;
    let mut options = RunOptions::new("warehouse", "alice");
    options.cron_schedule = "0 2 * * *".to_string();
    options.schedule_name = Some("nightly".to_string());

    let (status, body) = h.submit(&options).await;
    assert_eq!(status, StatusCode::CREATED);
    let schedule_id = RunId::new(body["schedule_id"].as_str().unwrap());
    assert!(schedule_id.is_schedule());

    let entry = h.scheduler.entry("nightly").unwrap();
    assert_eq!(entry.cron_expression, "0 2 * * *");
    assert_eq!(
        entry.trigger_url,
        format!("https://rj.example.com/api/schedules/{}/trigger", schedule_id)
    );

    let (status, listed) = h.json(Method::GET, "/api/schedules").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["name"], "nightly");

    let (status, body) = h
        .json(Method::POST, &format!("/api/schedules/{}/trigger", schedule_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    let run = RunId::new(body["run_id"].as_str().unwrap());
    assert_ne!(run, schedule_id);
    h.stream_logs(&run, "").await;
    assert_eq!(h.run_status(&run).await, "SUCCESS");

    let template = h
        .state
        .runtime
        .registry()
        .load_run_configuration(&schedule_id)
        .await
        .unwrap();
    assert_eq!(template.cron_schedule.as_deref(), Some("0 2 * * *"));
}

#[tokio::test]
async fn deleting_a_schedule_twice_is_404() {
    let h = Harness::new(FakeWorkload::new()).await;
    let mut options = RunOptions::new("warehouse", "alice");
    options.cron_schedule = "@daily".to_string();
    options.schedule_name = Some("nightly".to_string());
    let (status, _) = h.submit(&options).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = h.json(Method::DELETE, "/api/schedules/nightly").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h.json(Method::DELETE, "/api/schedules/nightly").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn triggering_a_plain_run_is_404() {
    let h = Harness::new(FakeWorkload::new()).await;
    let run = h.submit_run("alice").await;
    h.stream_logs(&run, "").await;

    let (status, _) = h
        .json(Method::POST, &format!("/api/schedules/{}/trigger", run))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_cron_is_400() {
    let h = Harness::new(FakeWorkload::new()).await;
    let mut options = RunOptions::new("warehouse", "alice");
    options.cron_schedule = "every day".to_string();

    let (status, body) = h.submit(&options).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid cron schedule");
    assert!(h.scheduler.calls().is_empty());
}

#[tokio::test]
async fn digest_mismatch_is_400_and_leaves_no_lock() {
    let h = Harness::new(FakeWorkload::new()).await;
    let mut options = RunOptions::new("warehouse", "alice");
    options.artifact_digest = Some(digest(b"something else"));

    let (status, _) = h.submit(&options).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.state.runtime.lock_info().await.unwrap().is_none());
}

#[tokio::test]
async fn matching_digest_is_accepted() {
    let h = Harness::new(FakeWorkload::new()).await;
    let mut options = RunOptions::new("warehouse", "alice");
    options.artifact_digest = Some(digest(&h.archive()));

    let (status, body) = h.submit(&options).await;
    assert_eq!(status, StatusCode::OK);
    h.stream_logs(&RunId::new(body["run_id"].as_str().unwrap()), "").await;
}

#[tokio::test]
async fn missing_archive_is_400() {
    let h = Harness::new(FakeWorkload::new()).await;
    let invocation = WorkloadInvocation::new("build");
    let options = RunOptions::new("warehouse", "alice");

    let (status, body) = h
        .submit_parts(&[
            ("invocation", serde_json::to_vec(&invocation).unwrap()),
            ("options", serde_json::to_vec(&options).unwrap()),
        ])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("archive"));
}

#[tokio::test]
async fn malformed_options_are_400() {
    let h = Harness::new(FakeWorkload::new()).await;
    let (status, body) = h
        .submit_parts(&[
            ("invocation", br#"{"command":"build"}"#.to_vec()),
            ("options", b"{not json".to_vec()),
            ("archive", h.archive()),
        ])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("options"));
}

#[tokio::test]
async fn unknown_run_is_404_for_status_and_logs() {
    let h = Harness::new(FakeWorkload::new()).await;

    let (status, _) = h.json(Method::GET, "/api/run/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h.json(Method::GET, "/api/logs/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn log_level_query_filters_events() {
    let h = Harness::new(FakeWorkload::new()).await;
    let run = h.submit_run("alice").await;

    let errors_only = h.stream_logs(&run, "?level=error").await;
    assert_eq!(errors_only.len(), 1);
    assert!(errors_only[0].is_sentinel());

    let (status, _) = h
        .json(Method::GET, &format!("/api/logs/{}?level=loud", run))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_lists_runs_by_project() {
    let h = Harness::new(FakeWorkload::new()).await;
    let first = h.submit_run("alice").await;
    h.stream_logs(&first, "").await;
    let second = h.submit_run("bob").await;
    h.stream_logs(&second, "").await;

    let (status, body) = h.json(Method::GET, "/api/runs").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["run_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    let (_, body) = h.json(Method::GET, "/api/runs?limit=1").await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = h.json(Method::GET, "/api/runs?project=elsewhere").await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn dispatched_run_is_running_after_submit() {
    let h = Harness::dispatched().await;
    let run = h.submit_run("alice").await;

    assert_eq!(h.run_status(&run).await, RunStatus::Running.as_str());
    assert_eq!(h.dispatcher.calls().len(), 2);
    let (_, body) = h.json(Method::GET, "/api/check").await;
    assert_eq!(body["backend"], "fake");
}

#[tokio::test]
async fn dispatch_create_failure_is_400() {
    let h = Harness::dispatched().await;
    h.dispatcher.fail_create("quota exceeded");

    let (status, body) = h.submit(&RunOptions::new("warehouse", "alice")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("quota exceeded"));
    assert!(h.state.runtime.lock_info().await.unwrap().is_none());
}
