// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managed serverless job backend
//!
//! `create` registers a job definition, `launch` starts one execution of it.

use super::{http, BatchDispatcher, DispatchError, DispatchRequest, JobHandle};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct CreatedJob {
    #[serde(default)]
    id: Option<String>,
}

/// Dispatcher for a managed job service reachable over HTTP
#[derive(Clone, Debug)]
pub struct ServerlessJobDispatcher {
    client: reqwest::Client,
    api_url: String,
    image: String,
    region: Option<String>,
    token: Option<String>,
}

impl ServerlessJobDispatcher {
    pub fn new(api_url: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            image: image.into(),
            region: None,
            token: None,
        }
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

#[async_trait]
impl BatchDispatcher for ServerlessJobDispatcher {
    fn backend(&self) -> &'static str {
        "serverless_job"
    }

    async fn create(&self, request: &DispatchRequest) -> Result<JobHandle, DispatchError> {
        let name = request.job_name();
        let body = json!({
            "name": name,
            "image": self.image,
            "command": request.job_command(),
            "env": {
                "RJ_RUN_ID": request.run_id.as_str(),
                "RJ_ARTIFACT_URI": request.artifact_uri,
                "RJ_COMMAND": request.invocation.to_string(),
            },
            "max_retries": request.max_retries,
            "region": self.region,
            "labels": request.provider_config,
        });

        let builder = self.client.post(format!("{}/jobs", self.api_url)).json(&body);
        let response = http::authorize(builder, self.token.as_deref())
            .send()
            .await
            .map_err(|e| DispatchError::CreateFailed(e.to_string()))?;
        let response = http::check(response)
            .await
            .map_err(DispatchError::CreateFailed)?;

        // Some services answer with an empty body; the name is the id then
        let created: Option<CreatedJob> = response.json().await.ok();
        let job_id = created.and_then(|c| c.id).unwrap_or(name);

        Ok(JobHandle {
            backend: self.backend().to_string(),
            job_id,
            run_id: request.run_id.clone(),
            started: false,
        })
    }

    async fn launch(&self, handle: &JobHandle) -> Result<(), DispatchError> {
        let url = format!("{}/jobs/{}/run", self.api_url, handle.job_id);
        let response = http::authorize(self.client.post(url), self.token.as_deref())
            .send()
            .await
            .map_err(|e| DispatchError::LaunchFailed(e.to_string()))?;
        http::check(response)
            .await
            .map_err(DispatchError::LaunchFailed)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "serverless_tests.rs"]
mod tests;
