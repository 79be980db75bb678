// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical workload invocation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A fully-qualified workload command: a subcommand plus its flags
///
/// A flag mapped to `None` is a boolean switch. Flags are kept sorted so the
/// same invocation always renders the same argument list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadInvocation {
    pub command: String,
    #[serde(default)]
    pub flags: BTreeMap<String, Option<String>>,
}

impl WorkloadInvocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            flags: BTreeMap::new(),
        }
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), Some(value.into()));
        self
    }

    pub fn with_switch(mut self, name: impl Into<String>) -> Self {
        self.flags.insert(name.into(), None);
        self
    }

    /// Render the argument list passed after the workload program
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.command.clone()];
        for (name, value) in &self.flags {
            args.push(format!("--{}", name));
            if let Some(value) = value {
                args.push(value.clone());
            }
        }
        args
    }
}

impl fmt::Display for WorkloadInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .to_args()
            .into_iter()
            .map(|arg| {
                if arg.is_empty() || arg.contains(char::is_whitespace) {
                    format!("'{}'", arg)
                } else {
                    arg
                }
            })
            .collect();
        write!(f, "{}", rendered.join(" "))
    }
}
