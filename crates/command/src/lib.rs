// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Command canonicalization
//!
//! Turns a command line as a user typed it into a [`WorkloadInvocation`]
//! with no remaining ambiguity. Pure: no I/O, same output for the same input.

mod canon;
mod known;
mod tokenize;

pub use canon::{canonicalize, CanonError};
pub use known::{FlagSpec, KnownParameters, KnownParametersError};
pub use tokenize::{tokenize, TokenizeError};

pub use rj_core::WorkloadInvocation;
