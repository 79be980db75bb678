// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifiers and id generation
//!
//! Run ids sort in creation order. Schedule templates share the id space but
//! carry [`SCHEDULE_PREFIX`] so the two namespaces never collide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Prefix distinguishing schedule templates from single executions
pub const SCHEDULE_PREFIX: &str = "schedule-";

/// Identifier of a run or schedule template
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a schedule id from a freshly generated id
    pub fn schedule(id: impl AsRef<str>) -> Self {
        Self(format!("{}{}", SCHEDULE_PREFIX, id.as_ref()))
    }

    /// Whether this id names a schedule template rather than an execution
    pub fn is_schedule(&self) -> bool {
        self.0.starts_with(SCHEDULE_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generates unique identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> String;

    /// Generate an id for a new run
    fn run_id(&self) -> RunId {
        RunId(self.next())
    }

    /// Generate an id for a new schedule template
    fn schedule_id(&self) -> RunId {
        RunId::schedule(self.next())
    }
}

/// ULID generator for production use
///
/// Ids generated within the same millisecond still sort in generation order.
#[derive(Clone)]
pub struct UlidIdGen {
    generator: Arc<Mutex<ulid::Generator>>,
}

impl UlidIdGen {
    pub fn new() -> Self {
        Self {
            generator: Arc::new(Mutex::new(ulid::Generator::new())),
        }
    }
}

impl Default for UlidIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGen for UlidIdGen {
    fn next(&self) -> String {
        let mut generator = self.generator.lock().unwrap_or_else(|e| e.into_inner());
        // Overflow only happens after 2^80 ids in one millisecond
        generator
            .generate()
            .unwrap_or_else(|_| ulid::Ulid::new())
            .to_string()
    }
}

/// Sequential ID generator for testing
///
/// Counters are zero-padded so ids keep sorting in creation order.
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("run")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{:06}", self.prefix, n)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
