// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Known workload parameters and their defaults

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while loading known parameters
#[derive(Debug, Error)]
pub enum KnownParametersError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("duplicate short alias -{alias} on --{first} and --{second}")]
    DuplicateShort {
        alias: char,
        first: String,
        second: String,
    },
}

/// Definition of one flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlagSpec {
    /// Single-character alias, e.g. `s` for `-s`
    #[serde(default)]
    pub short: Option<char>,
    /// Whether the flag consumes a value
    #[serde(default)]
    pub takes_value: bool,
    /// Value the workload assumes when the flag is absent
    #[serde(default)]
    pub default: Option<String>,
}

impl FlagSpec {
    fn value(short: Option<char>) -> Self {
        Self {
            short,
            takes_value: true,
            default: None,
        }
    }

    fn switch(short: Option<char>) -> Self {
        Self {
            short,
            takes_value: false,
            default: None,
        }
    }
}

/// The parameter surface of the workload program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownParameters {
    /// Program name; a leading occurrence in a command line is dropped
    pub program: String,
    /// Accepted subcommands. Empty accepts any.
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub flags: BTreeMap<String, FlagSpec>,
}

impl KnownParameters {
    /// Parse from TOML
    ///
    /// ```toml
    /// program = "dbt"
    /// commands = ["build", "run"]
    ///
    /// [flags.select]
    /// short = "s"
    /// takes_value = true
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, KnownParametersError> {
        let params: KnownParameters = toml::from_str(content)?;
        params.check_aliases()?;
        Ok(params)
    }

    fn check_aliases(&self) -> Result<(), KnownParametersError> {
        let mut seen: BTreeMap<char, &str> = BTreeMap::new();
        for (name, spec) in &self.flags {
            if let Some(alias) = spec.short {
                if let Some(first) = seen.insert(alias, name) {
                    return Err(KnownParametersError::DuplicateShort {
                        alias,
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve a short alias to its long flag name
    pub fn long_for_short(&self, alias: char) -> Option<&str> {
        self.flags
            .iter()
            .find(|(_, spec)| spec.short == Some(alias))
            .map(|(name, _)| name.as_str())
    }

    pub fn flag(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.get(name)
    }

    pub fn accepts_command(&self, command: &str) -> bool {
        self.commands.is_empty() || self.commands.iter().any(|c| c == command)
    }
}

impl Default for KnownParameters {
    /// Parameters of the dbt CLI, the default workload
    fn default() -> Self {
        let commands = [
            "build", "clone", "compile", "debug", "deps", "docs", "list", "ls", "parse",
            "retry", "run", "run-operation", "seed", "show", "snapshot", "source", "test",
        ];

        let mut flags = BTreeMap::new();
        flags.insert("select".to_string(), FlagSpec::value(Some('s')));
        flags.insert("exclude".to_string(), FlagSpec::value(None));
        flags.insert("selector".to_string(), FlagSpec::value(None));
        flags.insert("target".to_string(), FlagSpec::value(Some('t')));
        flags.insert("profile".to_string(), FlagSpec::value(None));
        flags.insert("vars".to_string(), FlagSpec::value(None));
        flags.insert("state".to_string(), FlagSpec::value(None));
        flags.insert(
            "threads".to_string(),
            FlagSpec {
                default: Some("1".to_string()),
                ..FlagSpec::value(None)
            },
        );
        flags.insert("full-refresh".to_string(), FlagSpec::switch(Some('f')));
        flags.insert("fail-fast".to_string(), FlagSpec::switch(Some('x')));
        flags.insert("defer".to_string(), FlagSpec::switch(None));
        flags.insert("store-failures".to_string(), FlagSpec::switch(None));

        Self {
            program: "dbt".to_string(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            flags,
        }
    }
}
