// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only run event log, one JSON event per line
//!
//! Readers track their own byte offset, so any number of them can tail the
//! same file without coordinating with the writer or each other.

use rj_core::LogEvent;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in log operations
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt event at byte {offset}: {source}")]
    Corrupt {
        offset: u64,
        #[source]
        source: serde_json::Error,
    },
}

/// Writer side of a run's event log
pub struct LogFile {
    file: File,
    path: PathBuf,
    appended: u64,
}

impl LogFile {
    /// Open or create the log at the given path
    pub fn open(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            appended: 0,
        })
    }

    /// Append one event. The line is complete on disk when this returns.
    pub fn append(&mut self, event: &LogEvent) -> Result<(), LogError> {
        let mut line = event.to_line()?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.appended += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events appended through this handle
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Read every complete event currently in the file
    pub fn read_all(path: &Path) -> Result<Vec<LogEvent>, LogError> {
        LogReader::new(path).read_available()
    }
}

/// Independent reader positioned at a byte offset
#[derive(Debug, Clone)]
pub struct LogReader {
    path: PathBuf,
    offset: u64,
}

impl LogReader {
    /// Reader starting at offset 0
    pub fn new(path: &Path) -> Self {
        Self::at_offset(path, 0)
    }

    pub fn at_offset(path: &Path, offset: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            offset,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read all complete lines past the current offset
    ///
    /// A trailing partial line is left for the next call. A log that does
    /// not exist yet reads as empty.
    pub fn read_available(&mut self) -> Result<Vec<LogEvent>, LogError> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let mut events = Vec::new();
        let mut consumed = 0usize;
        while let Some(newline) = buf[consumed..].iter().position(|b| *b == b'\n') {
            let line = &buf[consumed..consumed + newline];
            let line_offset = self.offset + consumed as u64;
            consumed += newline + 1;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let event = serde_json::from_slice(line).map_err(|source| LogError::Corrupt {
                offset: line_offset,
                source,
            })?;
            events.push(event);
        }
        self.offset += consumed as u64;
        Ok(events)
    }
}

#[cfg(test)]
#[path = "logfile_tests.rs"]
mod tests;
