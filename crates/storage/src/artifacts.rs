// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact namespaces on disk
//!
//! ```text
//! <root>/runs/<run_id>/metadata.json
//! <root>/runs/<run_id>/events.jsonl
//! <root>/runs/<run_id>/artifacts/input/...
//! <root>/runs/<run_id>/artifacts/output/...
//! <root>/schedules/<schedule_id>/...        (same shape)
//! ```

use crate::archive::{self, ArtifactError};
use chrono::{DateTime, Utc};
use rj_core::RunId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recorded alongside every namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub run_id: RunId,
    pub project: String,
    pub requester: String,
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the uploaded archive
    pub archive_digest: String,
    pub archive_bytes: u64,
    /// Set when this namespace was copied from a schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_schedule: Option<RunId>,
}

/// Root of all namespaces
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Namespace for a run or schedule id; schedule ids live under `schedules/`
    pub fn namespace(&self, id: &RunId) -> Namespace {
        let kind = if id.is_schedule() { "schedules" } else { "runs" };
        Namespace {
            root: self.root.join(kind).join(id.as_str()),
        }
    }

    /// Unpack an uploaded archive into a fresh namespace and record metadata
    pub fn store_upload(
        &self,
        archive_bytes: &[u8],
        metadata: &ArtifactMetadata,
    ) -> Result<Namespace, ArtifactError> {
        let namespace = self.namespace(&metadata.run_id);
        namespace.create()?;
        let files = archive::unpack(archive_bytes, &namespace.input_dir())?;
        namespace.write_metadata(metadata)?;
        tracing::info!(
            run_id = %metadata.run_id,
            files,
            bytes = archive_bytes.len(),
            "artifacts stored"
        );
        Ok(namespace)
    }

    /// Copy a schedule's artifacts into a fresh run namespace
    pub fn copy_namespace(
        &self,
        schedule_id: &RunId,
        run_id: &RunId,
        created_at: DateTime<Utc>,
    ) -> Result<Namespace, ArtifactError> {
        let source = self.namespace(schedule_id);
        if !source.root().is_dir() {
            return Err(ArtifactError::NamespaceNotFound(source.root().to_path_buf()));
        }
        let target = self.namespace(run_id);
        target.create()?;
        copy_dir(&source.artifacts_dir(), &target.artifacts_dir())?;
        // Output belongs to executions, not templates
        let output = target.output_dir();
        if output.exists() {
            fs::remove_dir_all(&output)?;
        }
        fs::create_dir_all(&output)?;

        let mut metadata = source.read_metadata()?;
        metadata.run_id = run_id.clone();
        metadata.created_at = created_at;
        metadata.source_schedule = Some(schedule_id.clone());
        target.write_metadata(&metadata)?;
        Ok(target)
    }
}

/// One run's or schedule's directory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    root: PathBuf,
}

impl Namespace {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn input_dir(&self) -> PathBuf {
        self.artifacts_dir().join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.artifacts_dir().join("output")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("events.jsonl")
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn create(&self) -> Result<(), ArtifactError> {
        fs::create_dir_all(self.input_dir())?;
        fs::create_dir_all(self.output_dir())?;
        Ok(())
    }

    pub fn write_metadata(&self, metadata: &ArtifactMetadata) -> Result<(), ArtifactError> {
        let json = serde_json::to_string_pretty(metadata)?;
        fs::write(self.metadata_path(), json)?;
        Ok(())
    }

    pub fn read_metadata(&self) -> Result<ArtifactMetadata, ArtifactError> {
        let json = fs::read_to_string(self.metadata_path())?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Recursively copy `src` into `dst`, returning the number of files copied
pub fn copy_dir(src: &Path, dst: &Path) -> Result<usize, ArtifactError> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
