// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! Server and transport errors are turned into an [`RjError`] that says what
//! went wrong, what the server reported, and what to try next.

use std::fmt;

use reqwest::StatusCode;
use rj_core::LockRecord;

use crate::client::ClientError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct RjError {
    /// What went wrong
    pub message: String,
    /// Details the server or transport reported
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RjError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for RjError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for RjError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Builders for the failures users hit most
impl RjError {
    /// Another run holds the exclusivity lock
    pub fn lock_held(lock: &LockRecord) -> Self {
        RjError::new("Another run is in progress")
            .with_context(format!("Run {} started by {}", lock.run_id, lock.holder))
            .with_context(format!(
                "Lock held since {}, last refreshed {}",
                lock.created_at.format("%Y-%m-%d %H:%M:%S"),
                lock.updated_at.format("%Y-%m-%d %H:%M:%S")
            ))
            .with_suggestion(format!("Follow it: rj logs {}", lock.run_id))
            .with_suggestion("Wait for it to finish and resubmit")
            .with_suggestion("If the holder is gone, release the lock: rj unlock")
    }

    /// The server did not answer
    pub fn unreachable(url: &str) -> Self {
        RjError::new(format!("Cannot reach rjd at {}", url))
            .with_suggestion("Check that rjd is running on that host")
            .with_suggestion("Point at another server with --server-url or RJ_SERVER_URL")
    }

    /// No run or schedule with this name
    pub fn not_found(what: &str) -> Self {
        RjError::new(format!("{} not found", what))
            .with_suggestion("List recent runs: rj history")
            .with_suggestion("List schedules: rj schedules list")
    }
}

impl From<ClientError> for RjError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unreachable { url, source } => {
                RjError::unreachable(&url).with_source(source)
            }
            ClientError::Api { status, body } => match body.lock_info {
                Some(lock) if status == StatusCode::LOCKED => RjError::lock_held(&lock),
                _ => {
                    let mut err = RjError::new(body.error).with_context(format!("HTTP {}", status));
                    if let Some(details) = body.details {
                        err = err.with_context(details);
                    }
                    err
                }
            },
            other => RjError::new(other.to_string()).with_source(other),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
