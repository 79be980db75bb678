// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rj_core::{RunId, WorkloadInvocation};
use std::path::Path;
use yare::parameterized;

#[parameterized(
    plain_stdout = { Stream::Stdout, "Running with dbt=1.8.0", Level::Info, "workload_output", "Running with dbt=1.8.0" },
    plain_stderr = { Stream::Stderr, "deprecated config", Level::Warn, "workload_output", "deprecated config" },
    flat_json = { Stream::Stdout, r#"{"level":"error","name":"ModelFailed","msg":"boom"}"#, Level::Error, "ModelFailed", "boom" },
    event_and_message = { Stream::Stdout, r#"{"level":"debug","event":"tick","message":"t"}"#, Level::Debug, "tick", "t" },
    nested_info = { Stream::Stdout, r#"{"info":{"level":"warn","name":"Note","msg":"n"},"data":{}}"#, Level::Warn, "Note", "n" },
    json_without_message = { Stream::Stdout, r#"{"level":"error"}"#, Level::Info, "workload_output", r#"{"level":"error"}"# },
    unknown_level = { Stream::Stderr, r#"{"level":"loud","msg":"x"}"#, Level::Warn, "workload_output", "x" },
    json_array = { Stream::Stdout, "[1,2]", Level::Info, "workload_output", "[1,2]" },
)]
fn lines_map_to_events(stream: Stream, line: &str, level: Level, name: &str, message: &str) {
    assert_eq!(parse_line(stream, line), WorkloadEvent::new(level, name, message));
}

fn context(input: &Path, output: &Path, script: &str) -> WorkloadContext {
    std::fs::write(input.join("job.sh"), script).unwrap();
    WorkloadContext {
        run_id: RunId::new("r1"),
        program: "sh".to_string(),
        invocation: WorkloadInvocation::new("job.sh").with_flag("select", "orders"),
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        env: vec![("EXTRA".to_string(), "yes".to_string())],
    }
}

async fn collect(
    ctx: &WorkloadContext,
) -> (Result<WorkloadOutcome, WorkloadError>, Vec<WorkloadEvent>) {
    let (tx, mut rx) = mpsc::channel(64);
    let result = ProcessWorkload::new().invoke(ctx, tx).await;
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

#[tokio::test]
async fn process_runs_in_input_dir_with_env() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let ctx = context(
        input.path(),
        output.path(),
        r#"
echo "args $1 $2"
echo "run $RJ_RUN_ID extra $EXTRA"
test "$(pwd)" = "$RJ_INPUT_DIR" && echo "cwd ok"
echo '{"level":"info","name":"Done","msg":"finished"}'
"#,
    );

    let (result, events) = collect(&ctx).await;
    assert_eq!(result.unwrap(), WorkloadOutcome::succeeded());

    let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["args --select orders", "run r1 extra yes", "cwd ok", "finished"]
    );
    assert_eq!(events[3].name, "Done");
}

#[tokio::test]
async fn nonzero_exit_is_a_failed_outcome() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let ctx = context(input.path(), output.path(), "echo oops >&2\nexit 3\n");

    let (result, events) = collect(&ctx).await;
    assert_eq!(result.unwrap(), WorkloadOutcome::failed(Some(3)));
    assert_eq!(events, vec![WorkloadEvent::new(Level::Warn, "workload_output", "oops")]);
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let mut ctx = context(input.path(), output.path(), "");
    ctx.program = "/definitely/not/here".to_string();

    let (result, events) = collect(&ctx).await;
    assert!(matches!(result, Err(WorkloadError::SpawnFailed(_))));
    assert!(events.is_empty());
}

#[tokio::test]
async fn missing_input_dir_is_rejected() {
    let output = tempfile::tempdir().unwrap();
    let ctx = WorkloadContext {
        run_id: RunId::new("r1"),
        program: "sh".to_string(),
        invocation: WorkloadInvocation::new("job.sh"),
        input_dir: output.path().join("missing"),
        output_dir: output.path().to_path_buf(),
        env: Vec::new(),
    };
    let (result, _) = collect(&ctx).await;
    assert!(matches!(result, Err(WorkloadError::MissingWorkingDir(_))));
}

#[test]
fn argv_puts_program_first() {
    let ctx = WorkloadContext {
        run_id: RunId::new("r1"),
        program: "dbt".to_string(),
        invocation: WorkloadInvocation::new("build").with_switch("full-refresh"),
        input_dir: "/in".into(),
        output_dir: "/out".into(),
        env: Vec::new(),
    };
    assert_eq!(ctx.argv(), vec!["dbt", "build", "--full-refresh"]);
}
