//! Engine error taxonomy
//!
//! Precondition violations (`DependencyNotSatisfied`, `TaskBusy`, `AgentBusy`)
//! are rejected synchronously and never partially applied. `BackendPollFailed`
//! is transient and swallowed inside the poll loop. `VersionConflict` is a
//! hard error on the write itself; a read-back mismatch is only a warning.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task {task_id} has unsatisfied dependencies: {unmet:?}")]
    DependencyNotSatisfied { task_id: String, unmet: Vec<String> },

    #[error("task {task_id} is in progress and cannot be reassigned")]
    TaskBusy { task_id: String },

    #[error("agent {agent_id} already has a task in flight")]
    AgentBusy { agent_id: String },

    #[error("version conflict writing {path}: stale version token")]
    VersionConflict { path: String },

    #[error("backend dispatch failed: {0}")]
    BackendDispatchFailed(String),

    #[error("backend poll failed: {0}")]
    BackendPollFailed(String),

    #[error("agent {0} not found")]
    AgentNotFound(String),

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("invalid transition for {entity} {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    #[error("no file at {path} on {ref_name}")]
    FileNotFound { path: String, ref_name: String },

    #[error("file store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Whether the error is transient and the caller should keep polling.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::BackendPollFailed(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
