//! Orchestration session facade
//!
//! One `Session` per project: owns the roster, the task board, the message
//! feed and the bridge, and exposes the handful of calls a dashboard needs.

use crate::agents::AgentRegistry;
use crate::backend::ExecutionBackend;
use crate::bridge::OrchestrationBridge;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::events::{EngineEvent, EventBroadcaster};
use crate::models::{Agent, AgentType, Task};
use crate::presenter;
use crate::store::FileStore;
use crate::tasks::TaskBoard;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Point-in-time view handed to the UI layer. Tasks are already
/// deduplicated and ordered for display.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
    pub messages: Vec<EngineEvent>,
}

pub struct Session {
    agents: Arc<AgentRegistry>,
    tasks: Arc<TaskBoard>,
    broadcaster: Arc<EventBroadcaster>,
    store: Arc<dyn FileStore>,
    bridge: Arc<OrchestrationBridge>,
}

impl Session {
    /// Create a session with the standard five-agent roster.
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn ExecutionBackend>,
        store: Arc<dyn FileStore>,
    ) -> Self {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let agents = Arc::new(AgentRegistry::new(broadcaster.clone()));
        let tasks = Arc::new(TaskBoard::new(broadcaster.clone()));

        for agent_type in AgentType::roster() {
            agents.create(display_name(agent_type), agent_type);
        }
        log::info!("[SESSION] Initialized roster of {} agents", agents.all().len());

        let bridge = Arc::new(OrchestrationBridge::new(
            config,
            agents.clone(),
            tasks.clone(),
            backend,
            store.clone(),
            broadcaster.clone(),
        ));

        Self {
            agents,
            tasks,
            broadcaster,
            store,
            bridge,
        }
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn task_board(&self) -> &TaskBoard {
        &self.tasks
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    /// Put a task on the board.
    pub fn create_task(&self, task: Task) -> Task {
        self.tasks.create(task)
    }

    /// Run one task on one agent.
    pub async fn execute(&self, task_id: &str, agent_id: &str) -> EngineResult<()> {
        self.bridge.execute(task_id, agent_id).await
    }

    /// Let the agent pick its next runnable task.
    pub async fn start_agent(&self, agent_id: &str) -> EngineResult<Option<String>> {
        self.bridge.start_agent(agent_id).await
    }

    /// Cancel the agent's in-flight work and return it to idle.
    pub fn stop_agent(&self, agent_id: &str) -> EngineResult<()> {
        self.bridge.stop_agent(agent_id)
    }

    /// Live event stream for UI updates.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.broadcaster.subscribe()
    }

    /// Current state of everything, tasks presented for display.
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut agents = self.agents.all();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        SessionSnapshot {
            agents,
            tasks: presenter::present(&self.tasks.all()),
            messages: self.broadcaster.feed(),
        }
    }

    /// Stop all agents. In-flight executions are abandoned.
    pub fn shutdown(&self) {
        log::info!("[SESSION] Shutting down, stopping all agents");
        self.bridge.stop_all();
    }
}

fn display_name(agent_type: AgentType) -> String {
    let role = match agent_type {
        AgentType::Architect => "Architect",
        AgentType::Frontend => "Frontend",
        AgentType::Backend => "Backend",
        AgentType::Testing => "Testing",
        AgentType::Devops => "DevOps",
        AgentType::Custom => "Custom",
    };
    format!("{} Agent", role)
}
