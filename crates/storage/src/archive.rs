// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact transfer: zip a project directory, unzip it into a namespace

use crate::ignore::IgnoreSet;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Errors that can occur while packing or unpacking artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid ignore pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("archive entry escapes the target directory: {0}")]
    UnsafeEntry(String),
    #[error("archive digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
    #[error("namespace not found: {0}")]
    NamespaceNotFound(PathBuf),
    #[error("archive expands past {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Cap on the bytes a single upload may expand to
pub const MAX_UNPACKED_BYTES: u64 = 4 << 30;

/// What went into an archive
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackSummary {
    /// Relative `/`-separated paths, in archive order
    pub files: Vec<String>,
    /// Uncompressed bytes
    pub bytes: u64,
}

/// Files under `project_dir` that a pack would include, sorted
pub fn packable_files(
    project_dir: &Path,
    ignore: &IgnoreSet,
) -> Result<Vec<String>, ArtifactError> {
    if !project_dir.is_dir() {
        return Err(ArtifactError::NotADirectory(project_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(project_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(project_dir) else {
            continue;
        };
        let relative = to_slash(relative);
        if !ignore.is_ignored(&relative) {
            files.push(relative);
        }
    }
    Ok(files)
}

/// Write a deflated zip of the non-ignored files under `project_dir`
pub fn pack<W: Write + Seek>(
    project_dir: &Path,
    ignore: &IgnoreSet,
    writer: W,
) -> Result<PackSummary, ArtifactError> {
    let files = packable_files(project_dir, ignore)?;
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(writer);
    let mut bytes = 0u64;
    for relative in &files {
        zip.start_file(relative.as_str(), options)?;
        let mut file = File::open(project_dir.join(relative))?;
        bytes += io::copy(&mut file, &mut zip)?;
    }
    zip.finish()?;

    tracing::debug!(files = files.len(), bytes, "packed artifacts");
    Ok(PackSummary { files, bytes })
}

/// Pack into memory
pub fn pack_to_vec(
    project_dir: &Path,
    ignore: &IgnoreSet,
) -> Result<(Vec<u8>, PackSummary), ArtifactError> {
    let mut cursor = Cursor::new(Vec::new());
    let summary = pack(project_dir, ignore, &mut cursor)?;
    Ok((cursor.into_inner(), summary))
}

/// Extract an archive under `dest`, returning the number of files written
///
/// Entries whose path would land outside `dest` are rejected, as is an
/// archive expanding past [`MAX_UNPACKED_BYTES`].
pub fn unpack(archive: &[u8], dest: &Path) -> Result<usize, ArtifactError> {
    unpack_limited(archive, dest, MAX_UNPACKED_BYTES)
}

/// [`unpack`] with an explicit cap on the total bytes written
///
/// Sizes declared in the archive are not trusted; the cap is enforced on
/// the bytes actually decompressed.
pub fn unpack_limited(archive: &[u8], dest: &Path, limit: u64) -> Result<usize, ArtifactError> {
    fs::create_dir_all(dest)?;
    let mut zip = ZipArchive::new(Cursor::new(archive))?;

    let mut written = 0;
    let mut remaining = limit;
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArtifactError::UnsafeEntry(entry.name().to_string()))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if entry.size() > remaining {
            return Err(ArtifactError::TooLarge { limit });
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&target)?;
        let copied = io::copy(&mut entry.take(remaining.saturating_add(1)), &mut file)?;
        if copied > remaining {
            drop(file);
            let _ = fs::remove_file(&target);
            return Err(ArtifactError::TooLarge { limit });
        }
        remaining -= copied;
        written += 1;
    }
    Ok(written)
}

/// Hex SHA-256 of an archive
pub fn digest(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Compare an archive against the digest its sender computed
pub fn verify_digest(bytes: &[u8], expected: &str) -> Result<String, ArtifactError> {
    let actual = digest(bytes);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(actual)
    } else {
        Err(ArtifactError::DigestMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
