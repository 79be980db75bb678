// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run log channel
//!
//! Writers append to the run's JSONL file and, for runs executing in this
//! process, to an in-memory queue. Tailers follow the queue when the run is
//! live here and poll the file otherwise. Either way a tail yields events in
//! append order and ends right after the sentinel.

use crate::lock::LockService;
use futures_util::stream::{self, Stream};
use rj_core::{Clock, LogEvent, LogFilter, RunId};
use rj_storage::{ArtifactStore, LogError, LogFile, LogReader};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Default delay between polls of a log with nothing new
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Events of a run executing in this process
#[derive(Default)]
struct LiveLog {
    events: Mutex<Vec<LogEvent>>,
    appended: Notify,
    /// Writer is gone; nothing more will arrive
    closed: AtomicBool,
}

impl LiveLog {
    fn push(&self, event: LogEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        self.appended.notify_waiters();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.appended.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

type LiveLogs = Arc<Mutex<HashMap<RunId, Arc<LiveLog>>>>;

/// Append and tail run logs
#[derive(Clone)]
pub struct LogChannel<C: Clock> {
    artifacts: ArtifactStore,
    live: LiveLogs,
    lock: Option<LockService<C>>,
    poll_interval: Duration,
}

impl<C: Clock> LogChannel<C> {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Self {
            artifacts,
            live: Arc::default(),
            lock: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Refresh the lock for the tailed run while waiting on it
    pub fn with_lock(mut self, lock: LockService<C>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Open the writer for a run
    ///
    /// While the writer is open, tailers in this process follow the
    /// in-memory queue instead of polling the file.
    pub fn writer(&self, run_id: &RunId) -> Result<LogWriter, LogError> {
        let path = self.artifacts.namespace(run_id).log_path();
        let file = LogFile::open(&path)?;
        let live = Arc::new(LiveLog::default());
        self.live_logs().insert(run_id.clone(), Arc::clone(&live));
        Ok(LogWriter {
            run_id: run_id.clone(),
            file,
            live,
            registry: Arc::clone(&self.live),
            closed: false,
        })
    }

    /// Append a single event without holding the run's writer
    ///
    /// Tailers following a live writer for the run see the event too.
    pub fn append(&self, run_id: &RunId, event: LogEvent) -> Result<(), LogError> {
        let path = self.artifacts.namespace(run_id).log_path();
        LogFile::open(&path)?.append(&event)?;
        let live = self.live_logs().get(run_id).cloned();
        if let Some(live) = live {
            live.push(event);
        }
        Ok(())
    }

    /// Tail a run's log from the beginning
    pub fn tail(&self, run_id: &RunId, filter: LogFilter) -> LogTail<C> {
        let source = match self.live_logs().get(run_id) {
            Some(live) => Source::Live {
                log: Arc::clone(live),
                cursor: 0,
            },
            None => Source::File(LogReader::new(&self.artifacts.namespace(run_id).log_path())),
        };
        LogTail {
            run_id: run_id.clone(),
            filter,
            source,
            pending: VecDeque::new(),
            lock: self.lock.clone(),
            poll_interval: self.poll_interval,
            done: false,
        }
    }

    fn live_logs(&self) -> std::sync::MutexGuard<'_, HashMap<RunId, Arc<LiveLog>>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Append side of one run's log
pub struct LogWriter {
    run_id: RunId,
    file: LogFile,
    live: Arc<LiveLog>,
    registry: LiveLogs,
    closed: bool,
}

impl LogWriter {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Append one event; the file line is durable before tailers see it
    ///
    /// Appending the sentinel closes the writer's in-memory queue.
    pub fn append(&mut self, event: LogEvent) -> Result<(), LogError> {
        self.file.append(&event)?;
        let sentinel = event.is_sentinel();
        self.live.push(event);
        if sentinel {
            self.close();
        }
        Ok(())
    }

    /// Events appended through this writer
    pub fn appended(&self) -> u64 {
        self.file.appended()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.live.close();
        let mut live = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        // A newer writer for the same run keeps its entry
        if live
            .get(&self.run_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.live))
        {
            live.remove(&self.run_id);
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        self.close();
    }
}

enum Source {
    Live { log: Arc<LiveLog>, cursor: usize },
    File(LogReader),
}

/// A reader following one run's log
///
/// Each tail keeps its own position, so any number can follow the same run.
pub struct LogTail<C: Clock> {
    run_id: RunId,
    filter: LogFilter,
    source: Source,
    pending: VecDeque<LogEvent>,
    lock: Option<LockService<C>>,
    poll_interval: Duration,
    done: bool,
}

impl<C: Clock> LogTail<C> {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Next event that passes the filter
    ///
    /// Returns `None` after the sentinel has been yielded. Waits while the
    /// run has produced nothing new.
    pub async fn next(&mut self) -> Option<Result<LogEvent, LogError>> {
        loop {
            if self.done {
                return None;
            }
            while let Some(event) = self.pending.pop_front() {
                if event.is_sentinel() {
                    self.done = true;
                    self.pending.clear();
                }
                if self.filter.allows(&event) {
                    return Some(Ok(event));
                }
            }

            match self.fill().await {
                Ok(true) => {}
                Ok(false) => self.refresh_lock().await,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Move newly appended events into `pending`, waiting up to one poll
    /// interval when there are none. Returns whether anything arrived.
    async fn fill(&mut self) -> Result<bool, LogError> {
        match &mut self.source {
            Source::Live { log, cursor } => {
                let log = Arc::clone(log);
                let notified = log.appended.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if take_live(&log, cursor, &mut self.pending) {
                    return Ok(true);
                }
                if log.is_closed() {
                    // Writer went away without a sentinel
                    self.done = true;
                    return Ok(false);
                }
                let _ = tokio::time::timeout(self.poll_interval, notified).await;
                Ok(take_live(&log, cursor, &mut self.pending))
            }
            Source::File(reader) => {
                let events = reader.read_available()?;
                if events.is_empty() {
                    tokio::time::sleep(self.poll_interval).await;
                    return Ok(false);
                }
                self.pending.extend(events);
                Ok(true)
            }
        }
    }

    async fn refresh_lock(&self) {
        if let Some(lock) = &self.lock {
            if let Err(e) = lock.refresh(&self.run_id).await {
                tracing::warn!(run_id = %self.run_id, error = %e, "lock refresh failed");
            }
        }
    }

    /// Consume the tail as a stream
    pub fn into_stream(self) -> impl Stream<Item = Result<LogEvent, LogError>> + Send {
        stream::unfold(self, |mut tail| async move {
            let item = tail.next().await?;
            Some((item, tail))
        })
    }
}

fn take_live(log: &LiveLog, cursor: &mut usize, pending: &mut VecDeque<LogEvent>) -> bool {
    let events = log.events.lock().unwrap_or_else(|e| e.into_inner());
    if *cursor >= events.len() {
        return false;
    }
    pending.extend(events[*cursor..].iter().cloned());
    *cursor = events.len();
    true
}

#[cfg(test)]
#[path = "log_channel_tests.rs"]
mod tests;
