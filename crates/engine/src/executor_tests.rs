// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rj_adapters::FakeWorkload;
use rj_core::{FakeClock, LockConfig, LogFilter};
use rj_storage::LogFile;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    registry: Registry,
    artifacts: ArtifactStore,
    lock: LockService<FakeClock>,
    logs: LogChannel<FakeClock>,
    clock: FakeClock,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open_in_memory().await.unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let clock = FakeClock::new();
        let lock = LockService::new(registry.clone(), clock.clone(), LockConfig::default());
        let logs = LogChannel::new(artifacts.clone())
            .with_lock(lock.clone())
            .with_poll_interval(Duration::from_millis(10));
        Self {
            dir,
            registry,
            artifacts,
            lock,
            logs,
            clock,
        }
    }

    fn executor(&self, workload: FakeWorkload) -> Executor<FakeWorkload, FakeClock> {
        Executor::new(
            self.registry.clone(),
            self.artifacts.clone(),
            self.logs.clone(),
            self.lock.clone(),
            workload,
            self.clock.clone(),
            ExecutorConfig {
                env: vec![("DBT_TARGET".to_string(), "prod".to_string())],
                ..ExecutorConfig::default()
            },
        )
    }

    /// Unpacked input for a run, holding one project file
    fn input(&self, run: &RunId) -> PathBuf {
        let input = self.artifacts.namespace(run).input_dir();
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("dbt_project.yml"), "name: demo\n").unwrap();
        input
    }

    fn log_names(&self, run: &RunId) -> Vec<String> {
        LogFile::read_all(&self.artifacts.namespace(run).log_path())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    async fn status(&self, run: &RunId) -> RunStatus {
        self.registry.get_run(run).await.unwrap().unwrap().run_status
    }
}

fn invocation() -> WorkloadInvocation {
    WorkloadInvocation::new("build").with_flag("select", "orders")
}

#[tokio::test]
async fn successful_run_walks_to_success() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);
    h.lock.acquire("alice", &run).await.unwrap();

    let workload = FakeWorkload::new()
        .with_events(vec![WorkloadEvent::new(Level::Info, "ModelPassed", "orders ok")]);
    let status = h
        .executor(workload.clone())
        .execute(&invocation(), &input, &run)
        .await
        .unwrap();

    assert_eq!(status, RunStatus::Success);
    let record = h.registry.get_run(&run).await.unwrap().unwrap();
    assert_eq!(record.run_status, RunStatus::Success);
    assert!(record.end_time.is_some());
    assert_eq!(
        h.log_names(&run),
        vec![
            "run_started",
            "ModelPassed",
            "workload_exited",
            "run_finalized",
            "command_completed"
        ]
    );
    assert!(h.lock.load().await.unwrap().is_none());

    let calls = workload.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].ctx.program, "dbt");
    assert_eq!(calls[0].ctx.input_dir, input);
    assert_eq!(calls[0].ctx.output_dir, h.artifacts.namespace(&run).output_dir());
    assert_eq!(calls[0].ctx.env, vec![("DBT_TARGET".to_string(), "prod".to_string())]);
}

#[tokio::test]
async fn failing_workload_is_failed_not_an_error() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);
    h.lock.acquire("alice", &run).await.unwrap();

    let status = h
        .executor(FakeWorkload::new().failing(Some(1)))
        .execute(&invocation(), &input, &run)
        .await
        .unwrap();

    assert_eq!(status, RunStatus::Failed);
    assert_eq!(h.status(&run).await, RunStatus::Failed);
    assert_eq!(h.log_names(&run).last().map(String::as_str), Some("command_completed"));
    assert!(h.lock.load().await.unwrap().is_none());
}

#[tokio::test]
async fn workload_error_finalizes_as_server_error() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);
    h.lock.acquire("alice", &run).await.unwrap();

    let err = h
        .executor(FakeWorkload::new().erroring("dbt not installed"))
        .execute(&invocation(), &input, &run)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecuteError::Workload(_)));
    assert_eq!(h.status(&run).await, RunStatus::ServerError);
    let names = h.log_names(&run);
    assert!(names.contains(&"server_error".to_string()));
    assert_eq!(names.last().map(String::as_str), Some("command_completed"));
    assert_eq!(names.iter().filter(|n| *n == "command_completed").count(), 1);
    assert!(h.lock.load().await.unwrap().is_none());
}

#[tokio::test]
async fn missing_input_is_a_server_error() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let missing = h.dir.path().join("nowhere");

    let err = h
        .executor(FakeWorkload::new())
        .execute(&invocation(), &missing, &run)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecuteError::MissingInput(_)));
    assert_eq!(h.status(&run).await, RunStatus::ServerError);
    assert_eq!(h.log_names(&run), vec!["server_error", "run_finalized", "command_completed"]);
}

#[tokio::test]
async fn outputs_are_persisted_after_success() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);

    let workload = FakeWorkload::new().with_output("target/run_results.json", r#"{"ok":true}"#);
    h.executor(workload)
        .execute(&invocation(), &input, &run)
        .await
        .unwrap();

    let persisted = h.artifacts.namespace(&run).output_dir().join("run_results.json");
    assert_eq!(std::fs::read_to_string(persisted).unwrap(), r#"{"ok":true}"#);
}

#[tokio::test]
async fn outputs_are_not_persisted_after_failure() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);

    let workload = FakeWorkload::new()
        .with_output("target/run_results.json", "{}")
        .failing(Some(1));
    h.executor(workload)
        .execute(&invocation(), &input, &run)
        .await
        .unwrap();

    let output = h.artifacts.namespace(&run).output_dir();
    assert!(!output.join("run_results.json").exists());
}

#[tokio::test]
async fn status_is_running_while_the_workload_runs() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);
    h.lock.acquire("alice", &run).await.unwrap();

    let workload = FakeWorkload::gated();
    let executor = h.executor(workload.clone());
    executor.initialize(&run).await.unwrap();
    assert_eq!(h.status(&run).await, RunStatus::Initializing);

    let task = {
        let run = run.clone();
        let input = input.clone();
        tokio::spawn(async move {
            executor
                .execute_initialized(&invocation(), &input, &run)
                .await
        })
    };

    let mut seen = RunStatus::Initializing;
    for _ in 0..100 {
        seen = h.status(&run).await;
        if seen == RunStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(seen, RunStatus::Running);
    assert!(h.lock.load().await.unwrap().is_some());

    workload.release();
    assert_eq!(task.await.unwrap().unwrap(), RunStatus::Success);
    assert!(h.lock.load().await.unwrap().is_none());
}

#[tokio::test]
async fn live_tail_sees_whole_run() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);

    let workload = FakeWorkload::gated()
        .with_events(vec![WorkloadEvent::new(Level::Info, "ModelPassed", "ok")]);
    let executor = h.executor(workload.clone());
    executor.initialize(&run).await.unwrap();

    let task = {
        let run = run.clone();
        tokio::spawn(async move { executor.execute_initialized(&invocation(), &input, &run).await })
    };

    // Wait for the writer so the tail follows memory
    for _ in 0..100 {
        if h.status(&run).await == RunStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let mut tail = h.logs.tail(&run, LogFilter::default());
    let first = tail.next().await.unwrap().unwrap();
    assert_eq!(first.name, "run_started");

    workload.release();
    let mut rest = Vec::new();
    while let Some(event) = tail.next().await {
        rest.push(event.unwrap().name);
    }
    assert_eq!(
        rest,
        vec!["ModelPassed", "workload_exited", "run_finalized", "command_completed"]
    );
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn dispatched_run_skips_recorded_transitions() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);
    h.registry
        .insert_run(&run, h.clock.now(), RunStatus::Initializing)
        .await
        .unwrap();
    h.registry
        .update_run_status(&run, RunStatus::Running, None)
        .await
        .unwrap();
    h.lock.acquire("alice", &run).await.unwrap();

    let status = h
        .executor(FakeWorkload::new())
        .execute_dispatched(&invocation(), &input, &run)
        .await
        .unwrap();

    assert_eq!(status, RunStatus::Success);
    assert!(h.lock.load().await.unwrap().is_none());
}

#[tokio::test]
async fn another_runs_lock_survives_cleanup() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);
    h.lock.acquire("bob", &RunId::new("r0")).await.unwrap();

    h.executor(FakeWorkload::new())
        .execute(&invocation(), &input, &run)
        .await
        .unwrap();

    let held = h.lock.load().await.unwrap().unwrap();
    assert_eq!(held.run_id, RunId::new("r0"));
}

#[tokio::test]
async fn duplicate_run_does_not_touch_existing_record() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);
    h.registry
        .insert_run(&run, h.clock.now(), RunStatus::Initializing)
        .await
        .unwrap();

    let err = h
        .executor(FakeWorkload::new())
        .execute(&invocation(), &input, &run)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecuteError::Registry(RegistryError::DuplicateRun(_))));
    assert_eq!(h.status(&run).await, RunStatus::Initializing);
}

#[tokio::test]
async fn duplicate_run_leaves_log_and_lock_alone() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);
    h.registry
        .insert_run(&run, h.clock.now(), RunStatus::Initializing)
        .await
        .unwrap();
    h.lock.acquire("bob", &run).await.unwrap();

    h.executor(FakeWorkload::new())
        .execute(&invocation(), &input, &run)
        .await
        .unwrap_err();

    assert!(!h.artifacts.namespace(&run).log_path().exists());
    let held = h.lock.load().await.unwrap().unwrap();
    assert_eq!(held.holder, "bob");
    assert_eq!(held.run_id, run);
}

#[tokio::test]
async fn workload_cannot_end_the_log_early() {
    let h = Harness::new().await;
    let run = RunId::new("r1");
    let input = h.input(&run);

    let workload = FakeWorkload::new().with_events(vec![
        WorkloadEvent::new(Level::Info, "command_completed", "fake end"),
        WorkloadEvent::new(Level::Info, "ModelPassed", "orders ok"),
    ]);
    h.executor(workload)
        .execute(&invocation(), &input, &run)
        .await
        .unwrap();

    let events = LogFile::read_all(&h.artifacts.namespace(&run).log_path()).unwrap();
    let sentinels = events.iter().filter(|e| e.is_sentinel()).count();
    assert_eq!(sentinels, 1);
    assert!(events.last().unwrap().is_sentinel());
    assert_eq!(events[1].name, "workload_output");
    assert_eq!(events[1].message, "[command_completed] fake end");

    let mut tail = h.logs.tail(&run, LogFilter::default());
    let mut seen = Vec::new();
    while let Some(event) = tail.next().await {
        seen.push(event.unwrap().name);
    }
    assert_eq!(
        seen,
        vec![
            "run_started",
            "workload_output",
            "ModelPassed",
            "workload_exited",
            "run_finalized",
            "command_completed"
        ]
    );
}
