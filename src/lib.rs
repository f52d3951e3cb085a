//! fleet-engine: agent/task orchestration for the fleet dashboard.
//!
//! A session hosts a roster of named agents that execute tasks against an
//! external model backend. Completed results are parsed for code artifacts
//! and follow-up tasks; artifacts land in a versioned file store and every
//! state change is published on the event feed.

pub mod agents;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod extractor;
pub mod models;
pub mod presenter;
pub mod session;
pub mod store;
pub mod tasks;

pub use agents::AgentRegistry;
pub use backend::{ExecutionBackend, HttpExecutionBackend, RemoteHandle, RemotePoll, RemoteStatus};
pub use bridge::OrchestrationBridge;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventBroadcaster, EventKind};
pub use extractor::{ArtifactExtractor, ExtractedOutput};
pub use models::{
    Agent, AgentStatus, AgentType, CodeArtifact, DraftTask, Task, TaskPriority, TaskStatus,
};
pub use session::{Session, SessionSnapshot};
pub use store::{FileStore, FileRecord, GitHubStore, MemoryStore, WriteOutcome};
pub use tasks::TaskBoard;
