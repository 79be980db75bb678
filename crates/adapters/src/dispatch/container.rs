// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container-instance backend
//!
//! Creating a container group starts it, so `launch` has nothing to do.

use super::{http, BatchDispatcher, DispatchError, DispatchRequest, JobHandle};
use async_trait::async_trait;
use serde_json::json;

/// Dispatcher that runs each job as a one-shot container group
#[derive(Clone, Debug)]
pub struct ContainerInstanceDispatcher {
    client: reqwest::Client,
    api_url: String,
    image: String,
    region: Option<String>,
    token: Option<String>,
}

impl ContainerInstanceDispatcher {
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
impl BatchDispatcher for ContainerInstanceDispatcher {
    fn backend(&self) -> &'static str {
        "container_instance"
    }

    async fn create(&self, request: &DispatchRequest) -> Result<JobHandle, DispatchError> {
        let name = request.job_name();
        let body = json!({
            "image": self.image,
            "command": request.job_command(),
            "env": {
                "RJ_RUN_ID": request.run_id.as_str(),
                "RJ_ARTIFACT_URI": request.artifact_uri,
            },
            "restart_policy": "Never",
            "max_retries": request.max_retries,
            "region": self.region,
            "labels": request.provider_config,
        });

        let url = format!("{}/container-groups/{}", self.api_url, name);
        let response = http::authorize(self.client.put(url).json(&body), self.token.as_deref())
            .send()
            .await
            .map_err(|e| DispatchError::CreateFailed(e.to_string()))?;
        http::check(response)
            .await
            .map_err(DispatchError::CreateFailed)?;

        Ok(JobHandle {
            backend: self.backend().to_string(),
            job_id: name,
            run_id: request.run_id.clone(),
            started: true,
        })
    }

    async fn launch(&self, handle: &JobHandle) -> Result<(), DispatchError> {
        tracing::debug!(job_id = %handle.job_id, "container group started on create");
        Ok(())
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
