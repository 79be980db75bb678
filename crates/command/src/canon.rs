// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonicalization of a raw command line

use crate::known::KnownParameters;
use crate::tokenize::{tokenize, TokenizeError};
use rj_core::WorkloadInvocation;
use thiserror::Error;

/// Errors that can occur during canonicalization
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CanonError {
    #[error("empty command")]
    Empty,
    #[error("{0}")]
    Tokenize(#[from] TokenizeError),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown short flag: -{0}")]
    UnknownShort(char),
    #[error("flag --{0} requires a value")]
    MissingValue(String),
    #[error("switch --{0} does not take a value")]
    UnexpectedValue(String),
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

/// Canonicalize a raw command line against the known parameters
///
/// - a leading program name is dropped (`dbt build` → `build`)
/// - short aliases expand to long names, `--flag=value` splits
/// - flags whose value equals the known default are omitted
/// - flags the parameter set does not know pass through: they take the next
///   word as value unless it is itself a flag
/// - a repeated flag keeps its last value
pub fn canonicalize(
    raw: &str,
    known: &KnownParameters,
) -> Result<WorkloadInvocation, CanonError> {
    let mut words = tokenize(raw)?.into_iter().peekable();

    if words.peek().map(String::as_str) == Some(known.program.as_str()) {
        words.next();
    }

    let command = words.next().ok_or(CanonError::Empty)?;
    if command.starts_with('-') {
        return Err(CanonError::UnexpectedArgument(command));
    }
    if !known.accepts_command(&command) {
        return Err(CanonError::UnknownCommand(command));
    }

    let mut invocation = WorkloadInvocation::new(command);

    while let Some(word) = words.next() {
        let (name, inline_value) = split_flag(&word, known)?;
        let spec = known.flag(&name);

        let value = match spec {
            Some(spec) if spec.takes_value => match inline_value {
                Some(value) => Some(value),
                None => match words.next() {
                    Some(next) if !next.starts_with('-') => Some(next),
                    _ => return Err(CanonError::MissingValue(name)),
                },
            },
            Some(_) => {
                if inline_value.is_some() {
                    return Err(CanonError::UnexpectedValue(name));
                }
                None
            }
            None => match inline_value {
                Some(value) => Some(value),
                None => match words.peek() {
                    Some(next) if !next.starts_with('-') => words.next(),
                    _ => None,
                },
            },
        };

        let is_default = match (spec.and_then(|s| s.default.as_ref()), &value) {
            (Some(default), Some(value)) => default == value,
            _ => false,
        };
        if is_default {
            invocation.flags.remove(&name);
        } else {
            invocation.flags.insert(name, value);
        }
    }

    Ok(invocation)
}

/// Split a word into a long flag name and an optional inline value
fn split_flag(word: &str, known: &KnownParameters) -> Result<(String, Option<String>), CanonError> {
    if let Some(long) = word.strip_prefix("--") {
        if long.is_empty() {
            return Err(CanonError::UnexpectedArgument(word.to_string()));
        }
        return Ok(match long.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (long.to_string(), None),
        });
    }

    if let Some(short) = word.strip_prefix('-') {
        let mut chars = short.chars();
        let alias = chars
            .next()
            .ok_or_else(|| CanonError::UnexpectedArgument(word.to_string()))?;
        let name = known
            .long_for_short(alias)
            .ok_or(CanonError::UnknownShort(alias))?
            .to_string();
        let rest: String = chars.collect();
        let inline = match rest.strip_prefix('=') {
            Some(value) => Some(value.to_string()),
            None if rest.is_empty() => None,
            None => Some(rest),
        };
        return Ok((name, inline));
    }

    Err(CanonError::UnexpectedArgument(word.to_string()))
}

#[cfg(test)]
#[path = "canon_tests.rs"]
mod tests;
