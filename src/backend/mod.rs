//! External task-execution backend
//!
//! The engine treats "ask the model to do X" as an opaque asynchronous call:
//! `dispatch` hands over an agent descriptor and task payload and returns a
//! remote handle; `poll_status` reports the backend's view of that unit of
//! work until it reaches a terminal status.

pub mod http;

pub use http::HttpExecutionBackend;

use crate::error::EngineResult;
use crate::models::{Agent, Task};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The bridge's reference to one in-flight call. Owned exclusively by the
/// bridge and dropped once the poll loop observes a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHandle {
    pub external_task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Completed | RemoteStatus::Failed)
    }
}

/// One poll observation of a remote handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePoll {
    pub status: RemoteStatus,
    /// Model output, present on completion.
    pub result: Option<String>,
    /// Backend error text, present on failure.
    pub error: Option<String>,
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn dispatch(&self, agent: &Agent, task: &Task) -> EngineResult<RemoteHandle>;

    async fn poll_status(&self, handle: &RemoteHandle) -> EngineResult<RemotePoll>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!RemoteStatus::Queued.is_terminal());
        assert!(!RemoteStatus::Running.is_terminal());
        assert!(RemoteStatus::Completed.is_terminal());
        assert!(RemoteStatus::Failed.is_terminal());
    }

    #[test]
    fn remote_status_wire_names_are_lowercase() {
        let poll: RemotePoll =
            serde_json::from_str(r#"{"status":"running","result":null,"error":null}"#).unwrap();
        assert_eq!(poll.status, RemoteStatus::Running);
    }
}
