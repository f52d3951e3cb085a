//! Agent domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role an agent is bound to for the lifetime of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Architect,
    Frontend,
    Backend,
    Testing,
    Devops,
    Custom,
}

impl AgentType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "architect" => Some(AgentType::Architect),
            "frontend" => Some(AgentType::Frontend),
            "backend" => Some(AgentType::Backend),
            "testing" | "test" | "qa" => Some(AgentType::Testing),
            "devops" | "ops" => Some(AgentType::Devops),
            "custom" => Some(AgentType::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Architect => "architect",
            AgentType::Frontend => "frontend",
            AgentType::Backend => "backend",
            AgentType::Testing => "testing",
            AgentType::Devops => "devops",
            AgentType::Custom => "custom",
        }
    }

    /// The standard roster created once per project.
    pub fn roster() -> Vec<AgentType> {
        vec![
            AgentType::Architect,
            AgentType::Frontend,
            AgentType::Backend,
            AgentType::Testing,
            AgentType::Devops,
        ]
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Working,
    Completed,
    Failed,
    /// Blocked on a dependency held by another agent.
    Waiting,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working => "working",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
            AgentStatus::Waiting => "waiting",
        };
        write!(f, "{}", s)
    }
}

/// A named logical worker bound to a role.
///
/// Created once per project at initialization; mutated only by the
/// orchestration bridge; never deleted during a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    /// Coarse progress indicator, 0-100.
    pub progress: u8,
    pub active_task_id: Option<String>,
    /// Reason recorded by the last `fail` transition, kept for diagnostics.
    pub last_error: Option<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            agent_type,
            status: AgentStatus::Idle,
            progress: 0,
            active_task_id: None,
            last_error: None,
        }
    }

    pub fn is_working(&self) -> bool {
        self.status == AgentStatus::Working
    }
}
