// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload run as a child process

use super::{Workload, WorkloadContext, WorkloadError, WorkloadEvent, WorkloadOutcome};
use async_trait::async_trait;
use rj_core::log::names;
use rj_core::Level;
use serde_json::{Map, Value};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn default_level(self) -> Level {
        match self {
            Stream::Stdout => Level::Info,
            Stream::Stderr => Level::Warn,
        }
    }
}

/// Runs `<program> <command> --flag value ...` in the input directory
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessWorkload;

impl ProcessWorkload {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Workload for ProcessWorkload {
    async fn invoke(
        &self,
        ctx: &WorkloadContext,
        events: mpsc::Sender<WorkloadEvent>,
    ) -> Result<WorkloadOutcome, WorkloadError> {
        if !ctx.input_dir.is_dir() {
            return Err(WorkloadError::MissingWorkingDir(ctx.input_dir.clone()));
        }

        let mut child = Command::new(&ctx.program)
            .args(ctx.invocation.to_args())
            .current_dir(&ctx.input_dir)
            .envs(ctx.process_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| WorkloadError::SpawnFailed(format!("{}: {}", ctx.program, e)))?;

        let stdout = child.stdout.take().map(|out| {
            tokio::spawn(forward_lines(out, Stream::Stdout, events.clone()))
        });
        let stderr = child.stderr.take().map(|err| {
            tokio::spawn(forward_lines(err, Stream::Stderr, events.clone()))
        });
        drop(events);

        let status = child.wait().await?;

        // Drain both pipes before reporting the outcome
        for reader in [stdout, stderr].into_iter().flatten() {
            if let Err(e) = reader.await {
                tracing::warn!(error = %e, "workload output reader failed");
            }
        }

        Ok(if status.success() {
            WorkloadOutcome::succeeded()
        } else {
            WorkloadOutcome::failed(status.code())
        })
    }
}

async fn forward_lines<R>(pipe: R, stream: Stream, events: mpsc::Sender<WorkloadEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                // Receiver gone: keep draining so the child never blocks on a full pipe
                let _ = events.send(parse_line(stream, &line)).await;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, ?stream, "failed to read workload output");
                break;
            }
        }
    }
}

/// Map one output line to an event
///
/// JSON objects carrying `msg` or `message` keep their own level and
/// `name`/`event`. Structured logs that nest these fields under `info` are
/// understood too. Anything else is plain `workload_output`.
pub fn parse_line(stream: Stream, line: &str) -> WorkloadEvent {
    let plain =
        || WorkloadEvent::new(stream.default_level(), names::WORKLOAD_OUTPUT, line.trim_end());

    let Ok(Value::Object(root)) = serde_json::from_str::<Value>(line) else {
        return plain();
    };
    let fields = match root.get("info") {
        Some(Value::Object(info)) => info,
        _ => &root,
    };

    let Some(message) = string_field(fields, &["msg", "message"]) else {
        return plain();
    };
    let level = string_field(fields, &["level"])
        .and_then(|l| l.parse().ok())
        .unwrap_or(stream.default_level());
    let name = string_field(fields, &["name", "event"]).unwrap_or(names::WORKLOAD_OUTPUT);

    WorkloadEvent::new(level, name, message)
}

fn string_field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
