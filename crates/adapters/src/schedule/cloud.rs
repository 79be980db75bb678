// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managed cron-trigger service over HTTP

use super::{CronScheduler, ScheduleEntry, ScheduleError};
use crate::dispatch::http;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Target {
    uri: String,
    #[serde(default = "post")]
    http_method: String,
}

fn post() -> String {
    "POST".to_string()
}

#[derive(Serialize, Deserialize)]
struct Job {
    name: String,
    schedule: String,
    #[serde(default)]
    time_zone: Option<String>,
    #[serde(default)]
    description: Option<String>,
    target: Target,
}

#[derive(Deserialize)]
struct JobList {
    #[serde(default)]
    schedules: Vec<Job>,
}

/// Scheduler backed by a cloud cron-trigger API
#[derive(Clone, Debug)]
pub struct CloudScheduler {
    client: reqwest::Client,
    api_url: String,
    time_zone: Option<String>,
    token: Option<String>,
}

impl CloudScheduler {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            time_zone: None,
            token: None,
        }
    }

    pub fn with_time_zone(mut self, time_zone: Option<String>) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn entry_url(&self, name: &str) -> Result<String, ScheduleError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ScheduleError::Rejected {
                name: name.to_string(),
                reason: "names may only contain letters, digits, '-' and '_'".to_string(),
            });
        }
        Ok(format!("{}/schedules/{}", self.api_url, name))
    }
}

#[async_trait]
impl CronScheduler for CloudScheduler {
    async fn create_or_update(
        &self,
        name: &str,
        cron_expression: &str,
        trigger_url: &str,
        description: Option<&str>,
    ) -> Result<(), ScheduleError> {
        let job = Job {
            name: name.to_string(),
            schedule: cron_expression.to_string(),
            time_zone: self.time_zone.clone(),
            description: description.map(str::to_string),
            target: Target {
                uri: trigger_url.to_string(),
                http_method: post(),
            },
        };

        // PUT on the named resource is an upsert
        let builder = self.client.put(self.entry_url(name)?).json(&job);
        let response = http::authorize(builder, self.token.as_deref())
            .send()
            .await
            .map_err(|e| ScheduleError::Request(e.to_string()))?;
        http::check(response)
            .await
            .map_err(|reason| ScheduleError::Rejected {
                name: name.to_string(),
                reason,
            })?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, ScheduleError> {
        let builder = self.client.delete(self.entry_url(name)?);
        let response = http::authorize(builder, self.token.as_deref())
            .send()
            .await
            .map_err(|e| ScheduleError::Request(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        http::check(response)
            .await
            .map_err(|reason| ScheduleError::Rejected {
                name: name.to_string(),
                reason,
            })?;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let builder = self.client.get(format!("{}/schedules", self.api_url));
        let response = http::authorize(builder, self.token.as_deref())
            .send()
            .await
            .map_err(|e| ScheduleError::Request(e.to_string()))?;
        let response = http::check(response)
            .await
            .map_err(ScheduleError::Request)?;
        let list: JobList = response
            .json()
            .await
            .map_err(|e| ScheduleError::Decode(e.to_string()))?;

        Ok(list
            .schedules
            .into_iter()
            .map(|job| ScheduleEntry {
                name: job.name,
                cron_expression: job.schedule,
                trigger_url: job.target.uri,
                description: job.description,
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "cloud_tests.rs"]
mod tests;
