// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run triggers: immediate (`@now`) or a five-field cron expression
//!
//! Expressions are validated here and handed to the scheduler backend
//! verbatim, so anything accepted must be standard cron syntax.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Trigger value requesting immediate execution
pub const RUN_NOW: &str = "@now";

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Cron validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("empty cron expression")]
    Empty,
    #[error("cron expression needs 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid {field} field: {value}")]
    InvalidField { field: &'static str, value: String },
    #[error("unknown cron macro: {0}")]
    UnknownMacro(String),
}

/// A validated five-field cron expression
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronExpr(String);

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value of the first entry in `names`
    names_base: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec {
        name: "minute",
        min: 0,
        max: 59,
        names: &[],
        names_base: 0,
    },
    FieldSpec {
        name: "hour",
        min: 0,
        max: 23,
        names: &[],
        names_base: 0,
    },
    FieldSpec {
        name: "day-of-month",
        min: 1,
        max: 31,
        names: &[],
        names_base: 0,
    },
    FieldSpec {
        name: "month",
        min: 1,
        max: 12,
        names: &MONTH_NAMES,
        names_base: 1,
    },
    FieldSpec {
        name: "day-of-week",
        min: 0,
        max: 7,
        names: &DAY_NAMES,
        names_base: 0,
    },
];

impl CronExpr {
    pub fn parse(input: &str) -> Result<Self, CronError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CronError::Empty);
        }

        let expanded = if input.starts_with('@') {
            expand_macro(input)?
        } else {
            input.to_string()
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != FIELDS.len() {
            return Err(CronError::FieldCount(fields.len()));
        }

        for (value, spec) in fields.iter().zip(FIELDS.iter()) {
            if !field_is_valid(value, spec) {
                return Err(CronError::InvalidField {
                    field: spec.name,
                    value: value.to_string(),
                });
            }
        }

        Ok(Self(fields.join(" ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CronExpr {
    type Error = CronError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CronExpr> for String {
    fn from(expr: CronExpr) -> Self {
        expr.0
    }
}

fn expand_macro(input: &str) -> Result<String, CronError> {
    let expanded = match input.to_ascii_lowercase().as_str() {
        "@hourly" => "0 * * * *",
        "@daily" | "@midnight" => "0 0 * * *",
        "@weekly" => "0 0 * * 0",
        "@monthly" => "0 0 1 * *",
        "@yearly" | "@annually" => "0 0 1 1 *",
        _ => return Err(CronError::UnknownMacro(input.to_string())),
    };
    Ok(expanded.to_string())
}

fn field_is_valid(field: &str, spec: &FieldSpec) -> bool {
    field.split(',').all(|item| item_is_valid(item, spec))
}

fn item_is_valid(item: &str, spec: &FieldSpec) -> bool {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (item, None),
    };

    if let Some(step) = step {
        match step.parse::<u32>() {
            Ok(n) if n > 0 && n <= spec.max => {}
            _ => return false,
        }
    }

    if range == "*" {
        return true;
    }

    match range.split_once('-') {
        Some((lo, hi)) => match (value_of(lo, spec), value_of(hi, spec)) {
            (Some(lo), Some(hi)) => lo <= hi,
            _ => false,
        },
        None => value_of(range, spec).is_some(),
    }
}

fn value_of(token: &str, spec: &FieldSpec) -> Option<u32> {
    if let Ok(n) = token.parse::<u32>() {
        return (spec.min..=spec.max).contains(&n).then_some(n);
    }
    let upper = token.to_ascii_uppercase();
    spec.names
        .iter()
        .position(|name| *name == upper)
        .map(|i| i as u32 + spec.names_base)
}

/// When a submitted run should execute
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    Now,
    Cron(CronExpr),
}

impl Trigger {
    pub fn parse(input: &str) -> Result<Self, CronError> {
        if input.trim() == RUN_NOW {
            Ok(Trigger::Now)
        } else {
            CronExpr::parse(input).map(Trigger::Cron)
        }
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
