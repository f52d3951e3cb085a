//! HTTP execution backend client

use super::{ExecutionBackend, RemoteHandle, RemotePoll};
use crate::error::{EngineError, EngineResult};
use crate::models::{Agent, Task};
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 60;

pub struct HttpExecutionBackend {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    agent: AgentDescriptor<'a>,
    task: TaskPayload<'a>,
}

#[derive(Debug, Serialize)]
struct AgentDescriptor<'a> {
    id: &'a str,
    name: &'a str,
    agent_type: &'a str,
}

#[derive(Debug, Serialize)]
struct TaskPayload<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
    priority: &'a str,
}

#[derive(Debug, Deserialize)]
struct DispatchResponse {
    task_id: String,
}

impl HttpExecutionBackend {
    pub fn new(base_url: &str, api_key: &str) -> EngineResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if !api_key.is_empty() {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| EngineError::BackendDispatchFailed(format!("invalid API key: {}", e)))?;
            headers.insert(header::AUTHORIZATION, auth_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                EngineError::BackendDispatchFailed(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ExecutionBackend for HttpExecutionBackend {
    async fn dispatch(&self, agent: &Agent, task: &Task) -> EngineResult<RemoteHandle> {
        let body = DispatchRequest {
            agent: AgentDescriptor {
                id: &agent.id,
                name: &agent.name,
                agent_type: agent.agent_type.as_str(),
            },
            task: TaskPayload {
                id: &task.id,
                title: &task.title,
                description: &task.description,
                priority: task.priority.as_str(),
            },
        };

        let response = self
            .client
            .post(format!("{}/tasks", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::BackendDispatchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::BackendDispatchFailed(format!(
                "backend returned {}",
                response.status()
            )));
        }

        let payload = response
            .json::<DispatchResponse>()
            .await
            .map_err(|e| EngineError::BackendDispatchFailed(format!("bad dispatch payload: {}", e)))?;

        log::info!(
            "[BACKEND] Dispatched task {} for {} (remote id {})",
            task.short_id(),
            agent.name,
            payload.task_id
        );

        Ok(RemoteHandle {
            external_task_id: payload.task_id,
        })
    }

    async fn poll_status(&self, handle: &RemoteHandle) -> EngineResult<RemotePoll> {
        let response = self
            .client
            .get(format!(
                "{}/tasks/{}",
                self.base_url,
                urlencoding::encode(&handle.external_task_id)
            ))
            .send()
            .await
            .map_err(|e| EngineError::BackendPollFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::BackendPollFailed(format!(
                "backend returned {}",
                response.status()
            )));
        }

        response
            .json::<RemotePoll>()
            .await
            .map_err(|e| EngineError::BackendPollFailed(format!("bad poll payload: {}", e)))
    }
}
