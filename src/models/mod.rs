pub mod agent;
pub mod artifact;
pub mod task;

pub use agent::{Agent, AgentStatus, AgentType};
pub use artifact::CodeArtifact;
pub use task::{DraftTask, Task, TaskPriority, TaskStatus};
