// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glob ignore patterns for artifact packing
//!
//! `*` matches within one path segment, `**` across segments, `?` one
//! character. A pattern without `/` matches at any depth.

use crate::archive::ArtifactError;
use regex::Regex;
use std::path::Path;

/// Per-project ignore file, one glob per line
pub const IGNORE_FILE: &str = ".rjignore";

/// Always excluded from uploads
pub const DEFAULT_IGNORES: &[&str] = &["target/**", "logs/**", ".git/**"];

#[derive(Debug, Clone)]
struct Pattern {
    glob: String,
    regex: Regex,
}

/// A set of compiled ignore globs
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The default patterns
    pub fn with_defaults() -> Result<Self, ArtifactError> {
        let mut set = Self::empty();
        for glob in DEFAULT_IGNORES {
            set.add(glob)?;
        }
        Ok(set)
    }

    /// Defaults plus the project's ignore file, if it has one
    pub fn for_project(project_dir: &Path) -> Result<Self, ArtifactError> {
        let mut set = Self::with_defaults()?;
        let path = project_dir.join(IGNORE_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => set.extend_from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(set)
    }

    /// Add patterns from ignore-file content; blank lines and `#` comments skipped
    pub fn extend_from_str(&mut self, content: &str) -> Result<(), ArtifactError> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.add(line)?;
        }
        Ok(())
    }

    pub fn add(&mut self, glob: &str) -> Result<(), ArtifactError> {
        let regex = Regex::new(&glob_to_regex(glob)).map_err(|e| ArtifactError::InvalidPattern {
            pattern: glob.to_string(),
            reason: e.to_string(),
        })?;
        self.patterns.push(Pattern {
            glob: glob.to_string(),
            regex,
        });
        Ok(())
    }

    /// Whether a `/`-separated relative path is ignored
    pub fn is_ignored(&self, relative: &str) -> bool {
        self.patterns.iter().any(|p| p.regex.is_match(relative))
    }

    pub fn globs(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.glob.as_str())
    }
}

fn glob_to_regex(glob: &str) -> String {
    let glob = glob.trim_start_matches("./").trim_start_matches('/');
    // A trailing slash names a directory: everything beneath it
    let owned;
    let glob = if let Some(dir) = glob.strip_suffix('/') {
        owned = format!("{}/**", dir);
        owned.as_str()
    } else {
        glob
    };

    let mut out = String::from("^");
    if !glob.contains('/') {
        out.push_str("(?:.*/)?");
    }

    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
#[path = "ignore_tests.rs"]
mod tests;
