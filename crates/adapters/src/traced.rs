// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::dispatch::{BatchDispatcher, DispatchError, DispatchRequest, JobHandle};
use crate::schedule::{CronScheduler, ScheduleEntry, ScheduleError};
use crate::workload::{Workload, WorkloadContext, WorkloadError, WorkloadEvent, WorkloadOutcome};
use async_trait::async_trait;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::Instrument;

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Wrapper that adds tracing to any Workload
#[derive(Clone)]
pub struct TracedWorkload<W> {
    inner: W,
}

impl<W> TracedWorkload<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W: Workload> Workload for TracedWorkload<W> {
    async fn invoke(
        &self,
        ctx: &WorkloadContext,
        events: mpsc::Sender<WorkloadEvent>,
    ) -> Result<WorkloadOutcome, WorkloadError> {
        let span = tracing::info_span!("workload.invoke", run_id = %ctx.run_id);
        async {
            tracing::info!(argv = ?ctx.argv(), cwd = %ctx.input_dir.display(), "starting");

            let start = Instant::now();
            let result = self.inner.invoke(ctx, events).await;

            match &result {
                Ok(outcome) => tracing::info!(
                    success = outcome.success,
                    exit_code = ?outcome.exit_code,
                    elapsed_ms = elapsed_ms(start),
                    "workload finished"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "workload could not run"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any BatchDispatcher
#[derive(Clone)]
pub struct TracedDispatcher<D> {
    inner: D,
}

impl<D> TracedDispatcher<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: BatchDispatcher> BatchDispatcher for TracedDispatcher<D> {
    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    async fn create(&self, request: &DispatchRequest) -> Result<JobHandle, DispatchError> {
        let span = tracing::info_span!(
            "dispatch.create",
            backend = self.inner.backend(),
            run_id = %request.run_id
        );
        async {
            tracing::info!(artifact_uri = %request.artifact_uri, "creating job");

            let start = Instant::now();
            let result = self.inner.create(request).await;

            match &result {
                Ok(handle) => tracing::info!(
                    job_id = %handle.job_id,
                    started = handle.started,
                    elapsed_ms = elapsed_ms(start),
                    "job created"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "create failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn launch(&self, handle: &JobHandle) -> Result<(), DispatchError> {
        let span = tracing::info_span!(
            "dispatch.launch",
            backend = self.inner.backend(),
            job_id = %handle.job_id
        );
        async {
            let start = Instant::now();
            let result = self.inner.launch(handle).await;

            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed_ms(start), "job launched"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "launch failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any CronScheduler
#[derive(Clone)]
pub struct TracedScheduler<S> {
    inner: S,
}

impl<S> TracedScheduler<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: CronScheduler> CronScheduler for TracedScheduler<S> {
    async fn create_or_update(
        &self,
        name: &str,
        cron_expression: &str,
        trigger_url: &str,
        description: Option<&str>,
    ) -> Result<(), ScheduleError> {
        let span = tracing::info_span!("scheduler.create_or_update", name, cron_expression);
        async {
            let start = Instant::now();
            let result = self
                .inner
                .create_or_update(name, cron_expression, trigger_url, description)
                .await;

            match &result {
                Ok(()) => tracing::info!(trigger_url, elapsed_ms = elapsed_ms(start), "schedule saved"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "schedule save failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, name: &str) -> Result<bool, ScheduleError> {
        let span = tracing::info_span!("scheduler.delete", name);
        async {
            let result = self.inner.delete(name).await;
            match &result {
                Ok(existed) => tracing::info!(existed, "schedule deleted"),
                Err(e) => tracing::error!(error = %e, "schedule delete failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let result = self.inner.list().await;
        tracing::debug!(count = ?result.as_ref().map(Vec::len).ok(), "listed schedules");
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
