// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rj artifacts` - list what `rj run` would upload

use anyhow::{Context, Result};
use clap::Args;
use rj_storage::{packable_files, IgnoreSet};
use std::path::{Path, PathBuf};

use super::Settings;
use crate::output::OutputFormat;

#[derive(Args, Debug)]
pub struct ArtifactsArgs {
    /// Project directory to pack
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Additional ignore glob (repeatable)
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,
}

/// Defaults, the project's `.rjignore`, then `extra`
pub fn ignore_set(project_dir: &Path, extra: &[String]) -> Result<IgnoreSet> {
    let mut set = IgnoreSet::for_project(project_dir)
        .with_context(|| format!("reading ignore file in {}", project_dir.display()))?;
    for glob in extra {
        set.add(glob)?;
    }
    Ok(set)
}

pub fn handle(args: ArtifactsArgs, settings: &Settings) -> Result<()> {
    let ignore = ignore_set(&args.project_dir, &args.ignore)?;
    let files = packable_files(&args.project_dir, &ignore)?;

    match settings.format {
        OutputFormat::Text => {
            for file in &files {
                println!("{}", file);
            }
            eprintln!("{} files", files.len());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&files)?),
    }
    Ok(())
}
