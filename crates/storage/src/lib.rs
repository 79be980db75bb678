// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rj-storage: durable state for Remote Jobs
//!
//! - [`Registry`]: run records, run configurations and the lock row in SQLite
//! - [`ArtifactStore`]: per-run and per-schedule directory namespaces
//! - [`pack`] / [`unpack`]: packing a project into a zip and unpacking it on the server
//! - [`LogFile`]: append-only JSONL event logs read by offset

mod archive;
mod artifacts;
mod ignore;
mod logfile;
mod migrations;
mod registry;

pub use archive::{
    digest, pack, pack_to_vec, packable_files, unpack, unpack_limited, verify_digest,
    ArtifactError, PackSummary, MAX_UNPACKED_BYTES,
};
pub use artifacts::{copy_dir, ArtifactMetadata, ArtifactStore, Namespace};
pub use ignore::{IgnoreSet, DEFAULT_IGNORES, IGNORE_FILE};
pub use logfile::{LogError, LogFile, LogReader};
pub use registry::{LockInsert, Registry, RegistryError};
